#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leasehold_lock::{ConnectionManager, DistributedLock, LockSettings, ManagerSettings};
use leasehold_state::{ConnectionConfig, LeaseStore, StoreConnector, StoreError, StoreHandles};
use leasehold_state_memory::{MemoryBackend, MemoryConnector, MemoryStore};

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short intervals so paused-clock tests stay readable.
pub fn fast_settings() -> ManagerSettings {
    ManagerSettings {
        health_check_interval: Duration::from_secs(1),
        max_retries: 3,
        retry_interval: Duration::from_millis(100),
        shutdown_timeout: Duration::from_secs(1),
        ..ManagerSettings::default()
    }
}

pub async fn manager_with(
    connector: &Arc<MemoryConnector>,
    config: ConnectionConfig,
) -> ConnectionManager {
    ConnectionManager::with_connector(
        config,
        fast_settings(),
        Arc::clone(connector) as Arc<dyn StoreConnector>,
    )
    .await
    .expect("manager should connect")
}

/// One simulated process: its own manager and lock over a shared backend.
pub struct Node {
    pub manager: Arc<ConnectionManager>,
    pub lock: DistributedLock,
}

impl Node {
    pub async fn start(backend: &MemoryBackend) -> Self {
        let connector = Arc::new(MemoryConnector::new(backend.clone()));
        let manager = Arc::new(manager_with(&connector, ConnectionConfig::default()).await);
        let lock = DistributedLock::with_settings(Arc::clone(&manager), LockSettings::default());
        Self { manager, lock }
    }
}

/// In-memory store whose conditional delete answers only after `delay`.
pub struct SlowRelease {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl LeaseStore for SlowRelease {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.compare_and_delete(key, expected).await
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.inner.compare_and_expire(key, expected, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.set(key, value, ttl).await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

/// Hands out [`SlowRelease`] handles over a shared backend.
pub struct SlowReleaseConnector {
    pub backend: MemoryBackend,
    pub delay: Duration,
}

#[async_trait]
impl StoreConnector for SlowReleaseConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<StoreHandles, StoreError> {
        let store = SlowRelease {
            inner: self.backend.handle(),
            delay: self.delay,
        };
        store.ping().await?;
        Ok(StoreHandles::shared(Arc::new(store)))
    }
}
