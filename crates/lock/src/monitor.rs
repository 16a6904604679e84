//! Background health check for a [`ConnectionManager`](crate::ConnectionManager).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::manager::Shared;

/// Spawn the health monitor. It runs until the manager's shutdown token is
/// cancelled.
pub(crate) fn spawn(shared: Arc<Shared>) -> JoinHandle<()> {
    tokio::spawn(run(shared))
}

async fn run(shared: Arc<Shared>) {
    let interval = shared.settings.health_check_interval;
    debug!(?interval, "health monitor started");

    loop {
        tokio::select! {
            biased;
            () = shared.shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        match shared.probe().await {
            Ok(()) => {
                if !shared.set_healthy(true) {
                    info!("store connection healthy again");
                }
            }
            Err(e) => {
                shared.set_healthy(false);
                if e.is_connectivity() {
                    warn!(error = %e, "store unreachable, reconnecting");
                } else {
                    warn!(error = %e, "health check rejected by store, reconnecting");
                }
                shared.reconnect().await;
            }
        }
    }

    debug!("health monitor stopped");
}
