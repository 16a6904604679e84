use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::StoreError;

/// A live handle to the backing key-value store.
///
/// Exposes exactly the primitives lease-based locking needs. Every mutating
/// call is atomic on the server side. Implementations must be `Send + Sync`
/// and safe for concurrent use through a shared `Arc`.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Set `key` to `value` with expiry `ttl` only if the key is absent.
    /// Returns `true` if the key was set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Delete `key` only if its current value equals `expected`.
    /// Returns `true` if the key was removed.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Reset the expiry of `key` to `ttl` only if its current value equals
    /// `expected`. Returns `true` if the expiry was extended.
    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Read the current value of `key`. Returns `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditionally write `key`, replacing any current value and expiry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Release the underlying connections. Best effort; later calls on this
    /// handle fail with [`StoreError::Closed`].
    async fn close(&self);
}

/// The primary (read/write) and secondary (read-only) handles for one
/// connection generation.
///
/// Topologies without read replicas hand out the same object twice.
#[derive(Clone)]
pub struct StoreHandles {
    pub primary: Arc<dyn LeaseStore>,
    pub secondary: Arc<dyn LeaseStore>,
}

impl StoreHandles {
    /// Use one handle for both roles.
    pub fn shared(handle: Arc<dyn LeaseStore>) -> Self {
        Self {
            secondary: Arc::clone(&handle),
            primary: handle,
        }
    }

    pub fn split(primary: Arc<dyn LeaseStore>, secondary: Arc<dyn LeaseStore>) -> Self {
        Self { primary, secondary }
    }

    /// Whether the secondary is a distinct connection.
    pub fn has_distinct_secondary(&self) -> bool {
        !Arc::ptr_eq(&self.primary, &self.secondary)
    }
}

impl std::fmt::Debug for StoreHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandles")
            .field("distinct_secondary", &self.has_distinct_secondary())
            .finish()
    }
}

/// Builds a fresh pair of handles for a configuration.
///
/// `connect` performs the topology-specific wiring and must finish with a
/// successful liveness check; a connector that returns `Ok` hands back
/// handles that answered a ping.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<StoreHandles, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify object safety of both traits.
    fn _assert_dyn_lease_store(_: &dyn LeaseStore) {}
    fn _assert_dyn_connector(_: &dyn StoreConnector) {}
}
