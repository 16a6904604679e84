use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use leasehold_state::{
    ConnectionConfig, ConnectionTopology, LeaseStore, StoreConnector, StoreError, StoreHandles,
};
use leasehold_state_redis::RedisConnector;

use crate::config::{LeaseholdConfig, ManagerSettings};
use crate::error::ConnectError;
use crate::monitor;

/// Keeps one healthy primary/secondary handle pair to the backing store.
///
/// The manager connects during construction and fails if the first
/// liveness check does not pass. A background task then probes the primary
/// handle every [`ManagerSettings::health_check_interval`] and runs a
/// bounded reconnection sequence when a probe fails. Dependents ask for the
/// current handle on every call, so a reconnect is picked up without any
/// coordination on their side.
///
/// Construct one per process at the composition root and share it through
/// an `Arc`.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the manager and its monitor task.
pub(crate) struct Shared {
    config: ConnectionConfig,
    pub(crate) settings: ManagerSettings,
    connector: Arc<dyn StoreConnector>,
    handles: RwLock<Option<StoreHandles>>,
    reconnect_lock: tokio::sync::Mutex<()>,
    healthy: AtomicBool,
    stopping: AtomicBool,
    pub(crate) shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Connect to Redis using the topology in `config`.
    pub async fn connect(
        config: ConnectionConfig,
        settings: ManagerSettings,
    ) -> Result<Self, ConnectError> {
        let connector = Arc::new(RedisConnector::new(settings.redis.clone()));
        Self::with_connector(config, settings, connector).await
    }

    /// Connect using the `[store]` and `[manager]` sections of a loaded
    /// configuration.
    pub async fn from_config(config: &LeaseholdConfig) -> Result<Self, ConnectError> {
        Self::connect(config.store.clone(), config.manager.settings()).await
    }

    /// Connect through a caller-supplied connector.
    ///
    /// The initial connection is attempted exactly once. Configuration
    /// problems surface as [`ConnectError::Config`] and connection failures
    /// as [`ConnectError::Connect`]; neither is retried.
    pub async fn with_connector(
        config: ConnectionConfig,
        settings: ManagerSettings,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self, ConnectError> {
        settings.validate().map_err(ConnectError::Config)?;
        config.validate()?;

        let handles = connector.connect(&config).await?;
        info!(
            topology = %config.topology,
            distinct_secondary = handles.has_distinct_secondary(),
            "store connection established"
        );

        let shared = Arc::new(Shared {
            config,
            settings,
            connector,
            handles: RwLock::new(Some(handles)),
            reconnect_lock: tokio::sync::Mutex::new(()),
            healthy: AtomicBool::new(true),
            stopping: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });
        let monitor = monitor::spawn(Arc::clone(&shared));

        Ok(Self {
            shared,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    /// The read/write handle.
    ///
    /// Returns [`StoreError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn primary(&self) -> Result<Arc<dyn LeaseStore>, StoreError> {
        self.shared.current().map(|h| h.primary)
    }

    /// The read-only handle. Identical to the primary unless the topology
    /// has a read replica.
    pub fn secondary(&self) -> Result<Arc<dyn LeaseStore>, StoreError> {
        self.shared.current().map(|h| h.secondary)
    }

    pub fn topology(&self) -> ConnectionTopology {
        self.shared.config.topology
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.shared.settings
    }

    /// Result of the most recent health probe or reconnection sequence.
    pub fn is_healthy(&self) -> bool {
        self.shared.healthy.load(Ordering::SeqCst)
    }

    /// Run a reconnection sequence now instead of waiting for the next
    /// failed probe. Returns whether the manager ends up with live handles.
    pub async fn reconnect(&self) -> bool {
        self.shared.reconnect().await
    }

    /// Stop the monitor and close both handles.
    ///
    /// Safe to call more than once; later calls return immediately. Handles
    /// that dependents obtained earlier are closed and fail with
    /// [`StoreError::Closed`].
    pub async fn shutdown(&self) {
        if self.shared.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.shutdown.cancel();

        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut handle) = monitor {
            let timeout = self.shared.settings.shutdown_timeout;
            if tokio::time::timeout(timeout, &mut handle).await.is_err() {
                warn!(?timeout, "health monitor did not stop in time, aborting it");
                handle.abort();
            }
        }

        let handles = self
            .shared
            .handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handles) = handles {
            close_handles(&handles).await;
        }
        self.shared.healthy.store(false, Ordering::SeqCst);
        info!(topology = %self.shared.config.topology, "connection manager shut down");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("topology", &self.shared.config.topology)
            .field("healthy", &self.is_healthy())
            .field("stopping", &self.shared.stopping.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn current(&self) -> Result<StoreHandles, StoreError> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::Closed)
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub(crate) fn set_healthy(&self, healthy: bool) -> bool {
        self.healthy.swap(healthy, Ordering::SeqCst)
    }

    /// Liveness probe against the current primary handle.
    pub(crate) async fn probe(&self) -> Result<(), StoreError> {
        self.current()?.primary.ping().await
    }

    /// Bounded reconnection sequence. At most one runs at a time.
    pub(crate) async fn reconnect(&self) -> bool {
        let _guard = self.reconnect_lock.lock().await;
        if self.is_stopping() {
            return false;
        }

        // A sequence that held the lock before us may already have fixed it.
        if self.probe().await.is_ok() {
            self.set_healthy(true);
            return true;
        }

        let max_retries = self.settings.max_retries;
        for attempt in 1..=max_retries {
            if let Ok(old) = self.current() {
                old.primary.close().await;
            }

            match self.connector.connect(&self.config).await {
                Ok(handles) => return self.install(handles, attempt).await,
                Err(e) => {
                    warn!(attempt, max_retries, error = %e, "reconnection attempt failed");
                }
            }

            if attempt < max_retries {
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => return false,
                    () = tokio::time::sleep(self.settings.retry_interval) => {}
                }
            }
        }

        self.set_healthy(false);
        error!(
            max_retries,
            topology = %self.config.topology,
            "reconnection attempts exhausted; waiting for the next health check"
        );
        false
    }

    async fn install(&self, handles: StoreHandles, attempt: u32) -> bool {
        let previous = {
            let mut slot = self.handles.write().unwrap_or_else(PoisonError::into_inner);
            if self.is_stopping() {
                None
            } else {
                Some(slot.replace(handles.clone()))
            }
        };

        let Some(previous) = previous else {
            debug!("manager stopped during reconnect, discarding new handles");
            close_handles(&handles).await;
            return false;
        };
        if let Some(old) = previous
            && old.has_distinct_secondary()
        {
            old.secondary.close().await;
        }

        self.set_healthy(true);
        info!(attempt, topology = %self.config.topology, "store connection re-established");
        true
    }
}

async fn close_handles(handles: &StoreHandles) {
    handles.primary.close().await;
    if handles.has_distinct_secondary() {
        handles.secondary.close().await;
    }
}
