use std::time::Duration;

/// Connection tuning for the Redis connector.
///
/// Topology and credentials live in
/// [`ConnectionConfig`](leasehold_state::ConnectionConfig); this carries the
/// client-side knobs that do not change what the connector talks to.
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// Number of connections in the `deadpool-redis` pool (standalone and
    /// master-slave topologies).
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,

    /// Upper bound on every data-path call, including connection setup.
    pub request_timeout: Duration,

    /// Upper bound on each master/replica lookup against the sentinels.
    pub sentinel_timeout: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            sentinel_timeout: Duration::from_millis(500),
        }
    }
}
