use std::time::Duration;

use leasehold_state::LockKey;

use crate::watchdog::Watchdog;

/// What a [`DistributedLock`](crate::DistributedLock) remembers about a key
/// it holds.
///
/// An entry exists in the lock's table only while this instance believes it
/// holds the lease; presence is the locked flag.
pub(crate) struct LockState {
    pub(crate) key: LockKey,
    pub(crate) holder: String,
    pub(crate) lease: Duration,
    pub(crate) watchdog: Option<Watchdog>,
}

impl LockState {
    pub(crate) fn new(
        key: LockKey,
        holder: String,
        lease: Duration,
        watchdog: Option<Watchdog>,
    ) -> Self {
        Self {
            key,
            holder,
            lease,
            watchdog,
        }
    }

    pub(crate) fn is_renewing(&self) -> bool {
        self.watchdog.as_ref().is_some_and(Watchdog::is_running)
    }
}
