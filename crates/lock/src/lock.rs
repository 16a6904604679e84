use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use leasehold_state::LockKey;

use crate::config::LockSettings;
use crate::error::LockError;
use crate::manager::ConnectionManager;
use crate::state::LockState;
use crate::watchdog::Watchdog;

/// Options for a single [`DistributedLock::acquire`] call.
///
/// Defaults: a freshly generated holder token, the lock's default lease,
/// blocking without a timeout, no auto-renewal.
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    holder: Option<String>,
    lease: Option<Duration>,
    blocking: bool,
    auto_renew: bool,
    timeout: Option<Duration>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            holder: None,
            lease: None,
            blocking: true,
            auto_renew: false,
            timeout: None,
        }
    }
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `holder` as the fencing token instead of a generated one. It must
    /// be unique among concurrent acquirers of the same key.
    #[must_use]
    pub fn holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }

    #[must_use]
    pub fn lease(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Retry on the poll interval until acquired (`true`, the default) or
    /// make a single attempt (`false`).
    #[must_use]
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Keep the lease alive in the background until release.
    #[must_use]
    pub fn auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }

    /// Give up a blocking acquisition after `timeout`. Ignored when not
    /// blocking.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Named, lease-based mutual exclusion across processes sharing one store.
///
/// A lease is a key whose value is the holder's fencing token and whose TTL
/// is the lease duration. Release and renewal only touch the key while it
/// still carries this instance's token, so a holder whose lease expired can
/// never remove or extend someone else's.
///
/// The lock is advisory and time-bounded. A holder that outlives its lease
/// without auto-renewal finds out only when [`release`](Self::release)
/// returns `false`.
pub struct DistributedLock {
    manager: Arc<ConnectionManager>,
    settings: LockSettings,
    states: Mutex<HashMap<String, LockState>>,
}

impl DistributedLock {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self::with_settings(manager, LockSettings::default())
    }

    pub fn with_settings(manager: Arc<ConnectionManager>, settings: LockSettings) -> Self {
        Self {
            manager,
            settings,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// The store key used for lock `name`.
    pub fn key_for(&self, name: &str) -> LockKey {
        LockKey::new(&self.settings.key_prefix, name)
    }

    /// Try to take the lease on `key`.
    ///
    /// Returns `Ok(false)` when the key is held elsewhere (non-blocking) or
    /// the timeout ran out (blocking). Store failures are returned as errors
    /// and end a blocking wait.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn acquire(&self, key: &str, options: AcquireOptions) -> Result<bool, LockError> {
        if key.is_empty() {
            return Err(LockError::InvalidKey);
        }
        let lease = options.lease.unwrap_or(self.settings.default_lease);
        if lease.is_zero() {
            return Err(LockError::InvalidLease(lease));
        }
        let holder = options
            .holder
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let lock_key = self.key_for(key);

        let acquired = if options.blocking {
            self.poll(&lock_key, &holder, lease, options.timeout).await?
        } else {
            self.attempt(&lock_key, &holder, lease).await?
        };
        if !acquired {
            debug!("lock held elsewhere");
            return Ok(false);
        }

        // The watchdog is spawned with the table locked so it is never
        // running without an entry that owns it.
        let previous = {
            let mut states = self.states.lock().await;
            let watchdog = options.auto_renew.then(|| {
                Watchdog::spawn(
                    Arc::clone(&self.manager),
                    lock_key.clone(),
                    holder.clone(),
                    lease,
                )
            });
            states.insert(
                key.to_owned(),
                LockState::new(lock_key, holder, lease, watchdog),
            )
        };

        // The old lease expired and was taken again; its watchdog can only fail.
        if let Some(old) = previous.and_then(|s| s.watchdog) {
            old.stop().await;
        }

        info!(
            lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX),
            auto_renew = options.auto_renew,
            "lock acquired"
        );
        Ok(true)
    }

    /// Single non-blocking attempt.
    pub async fn try_acquire(
        &self,
        key: &str,
        options: AcquireOptions,
    ) -> Result<bool, LockError> {
        self.acquire(key, options.blocking(false)).await
    }

    async fn attempt(
        &self,
        key: &LockKey,
        holder: &str,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let store = self.manager.primary()?;
        Ok(store.set_if_absent(key.as_str(), holder, lease).await?)
    }

    async fn poll(
        &self,
        key: &LockKey,
        holder: &str,
        lease: Duration,
        timeout: Option<Duration>,
    ) -> Result<bool, LockError> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if self.attempt(key, holder, lease).await? {
                return Ok(true);
            }

            let mut pause = self.settings.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(false);
                }
                pause = pause.min(deadline - now);
            }
            tokio::time::sleep(pause).await;
        }
    }

    /// Give up the lease on `key`.
    ///
    /// Returns `true` only if the store still held this instance's token and
    /// the key was deleted. Returns `false` if the key is not held here, if
    /// the lease was already lost (the local entry is dropped), or if the
    /// store call failed (the local entry is kept so the release can be
    /// retried).
    ///
    /// The lock table is only held to look up and update the entry, never
    /// across the watchdog join or the store round trip.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn release(&self, key: &str) -> bool {
        let (lock_key, holder, lease, watchdog) = {
            let mut states = self.states.lock().await;
            let Some(state) = states.get_mut(key) else {
                debug!("lock not held by this instance");
                return false;
            };
            (
                state.key.clone(),
                state.holder.clone(),
                state.lease,
                state.watchdog.take(),
            )
        };

        if let Some(watchdog) = watchdog {
            watchdog.stop().await;
        }

        let deleted = match self.manager.primary() {
            Ok(store) => store.compare_and_delete(lock_key.as_str(), &holder).await,
            Err(e) => Err(e),
        };

        match deleted {
            Ok(true) => {
                self.forget(key, &holder).await;
                info!("lock released");
                true
            }
            Ok(false) => {
                self.forget(key, &holder).await;
                warn!(
                    lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX),
                    "lease was lost before release"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "release failed, lock still held locally");
                false
            }
        }
    }

    /// Drop the entry for `key` if it still belongs to `holder`; a newer
    /// acquisition may have replaced it while the store call was in flight.
    async fn forget(&self, key: &str, holder: &str) {
        let mut states = self.states.lock().await;
        if states.get(key).is_some_and(|s| s.holder == holder) {
            states.remove(key);
        }
    }

    /// Whether this instance believes it holds `key`. Local state only; a
    /// lease that silently expired still reports `true` until released.
    pub async fn is_locked(&self, key: &str) -> bool {
        self.states.lock().await.contains_key(key)
    }

    /// Whether a watchdog is still renewing the lease on `key`.
    pub async fn is_renewing(&self, key: &str) -> bool {
        self.states
            .lock()
            .await
            .get(key)
            .is_some_and(LockState::is_renewing)
    }

    /// The fencing token of the current acquisition of `key`, if held.
    pub async fn holder(&self, key: &str) -> Option<String> {
        self.states
            .lock()
            .await
            .get(key)
            .map(|s| s.holder.clone())
    }

    /// Run `f` while holding `key`.
    ///
    /// Fails with [`LockError::NotAcquired`] if the lease could not be
    /// taken. Otherwise the lease is released after `f` completes, including
    /// when it panics (the panic is resumed after release). If the returned
    /// future is dropped before completion the watchdog is stopped and the
    /// lease runs out on its own.
    pub async fn scoped<F, Fut, T>(
        &self,
        key: &str,
        options: AcquireOptions,
        f: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.acquire(key, options).await? {
            return Err(LockError::NotAcquired {
                key: key.to_owned(),
            });
        }

        let guard = StopRenewalOnDrop(self.watchdog_token(key).await);
        let outcome = AssertUnwindSafe(f()).catch_unwind().await;
        guard.disarm();

        if !self.release(key).await {
            warn!(key, "scoped lock was not released cleanly");
        }
        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn watchdog_token(&self, key: &str) -> Option<CancellationToken> {
        self.states
            .lock()
            .await
            .get(key)
            .and_then(|s| s.watchdog.as_ref().map(Watchdog::token))
    }
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("key_prefix", &self.settings.key_prefix)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

/// Cancels a watchdog if a scoped body is abandoned mid-flight.
struct StopRenewalOnDrop(Option<CancellationToken>);

impl StopRenewalOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for StopRenewalOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.0.take() {
            token.cancel();
        }
    }
}
