use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::debug;

use leasehold_state::config::ConnectionConfig;
use leasehold_state::error::StoreError;
use leasehold_state::store::{LeaseStore, StoreConnector, StoreHandles};

use crate::store::MemoryBackend;

/// [`StoreConnector`] over a [`MemoryBackend`].
///
/// Each successful `connect` opens fresh handles onto the same backend.
/// Sentinel configurations get a distinct secondary handle; every other
/// topology shares one handle for both roles.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    backend: MemoryBackend,
    refuse: AtomicU32,
    attempts: AtomicU32,
}

impl MemoryConnector {
    pub fn new(backend: MemoryBackend) -> Self {
        Self {
            backend,
            refuse: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    /// Make the next `n` connection attempts fail with a connection error.
    pub fn refuse_next(&self, n: u32) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    /// Number of `connect` calls seen so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<StoreHandles, StoreError> {
        config.validate()?;
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            debug!(attempt, "memory connector refusing connection");
            return Err(StoreError::Connection("connection refused".into()));
        }

        let primary: Arc<dyn LeaseStore> = Arc::new(self.backend.handle());
        primary.ping().await?;

        let handles = if config.topology.has_read_replica() {
            let secondary: Arc<dyn LeaseStore> = Arc::new(self.backend.handle());
            StoreHandles::split(primary, secondary)
        } else {
            StoreHandles::shared(primary)
        };
        debug!(attempt, topology = %config.topology, "memory connector connected");
        Ok(handles)
    }
}
