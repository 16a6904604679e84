use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use leasehold_state::LockKey;

use crate::manager::ConnectionManager;

/// Background task that keeps one lease alive.
///
/// Every `lease / 3` it extends the key's expiry, but only while the stored
/// value still equals the holder token. The first failed extension, whether
/// the lease was lost or the store errored, ends the task without notice.
/// Dropping a `Watchdog` cancels the task.
pub(crate) struct Watchdog {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Watchdog {
    pub(crate) fn spawn(
        manager: Arc<ConnectionManager>,
        key: LockKey,
        holder: String,
        lease: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(renew(manager, key, holder, lease, cancel.clone()));
        Self { cancel, handle }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// A token that stops this watchdog when cancelled.
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the task and wait for it to finish. An extension already in
    /// flight completes before this returns.
    pub(crate) async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.handle).await
            && e.is_panic()
        {
            warn!(error = %e, "lease watchdog panicked");
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub(crate) fn renew_interval(lease: Duration) -> Duration {
    (lease / 3).max(Duration::from_millis(1))
}

async fn renew(
    manager: Arc<ConnectionManager>,
    key: LockKey,
    holder: String,
    lease: Duration,
    cancel: CancellationToken,
) {
    let interval = renew_interval(lease);
    debug!(key = %key, ?interval, "lease watchdog started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(key = %key, "lease watchdog stopped");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }

        let extended = match manager.primary() {
            Ok(store) => store.compare_and_expire(key.as_str(), &holder, lease).await,
            Err(e) => Err(e),
        };
        match extended {
            Ok(true) => debug!(key = %key, "lease extended"),
            Ok(false) => {
                warn!(key = %key, "lease no longer held, watchdog exiting");
                return;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "lease extension failed, watchdog exiting");
                return;
            }
        }
    }
}
