//! Configuration for the connection manager and the distributed lock.
//!
//! Runtime code works with [`ManagerSettings`] and [`LockSettings`]. The
//! TOML-facing [`LeaseholdConfig`] uses plain integer fields and converts
//! into those settings.
//!
//! ```toml
//! [store]
//! topology = "standalone"
//! host = "127.0.0.1"
//! port = 6379
//!
//! [manager]
//! health_check_interval_seconds = 30
//! max_retries = 10
//! retry_interval_seconds = 3
//!
//! [lock]
//! key_prefix = "leasehold"
//! default_lease_seconds = 30
//! poll_interval_ms = 100
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use leasehold_state::ConnectionConfig;
use leasehold_state_redis::RedisOptions;

use crate::error::ConfigError;

/// Health monitoring and reconnection settings for a
/// [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// How often the monitor probes the primary handle (default: 30 seconds).
    pub health_check_interval: Duration,
    /// Connection attempts per reconnection sequence (default: 10).
    pub max_retries: u32,
    /// Fixed pause between reconnection attempts (default: 3 seconds).
    pub retry_interval: Duration,
    /// How long shutdown waits for the monitor task (default: 5 seconds).
    pub shutdown_timeout: Duration,
    /// Client-side tuning handed to the Redis connector.
    pub redis: RedisOptions,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            max_retries: 10,
            retry_interval: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            redis: RedisOptions::default(),
        }
    }
}

impl ManagerSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.health_check_interval.is_zero() {
            return Err("health check interval must be positive".into());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".into());
        }
        Ok(())
    }
}

/// Settings for a [`DistributedLock`](crate::DistributedLock).
#[derive(Debug, Clone)]
pub struct LockSettings {
    /// Prefix applied to every lock key (default: `"leasehold"`).
    pub key_prefix: String,
    /// Lease used when an acquisition does not name one (default: 30 seconds).
    pub default_lease: Duration,
    /// Pause between attempts of a blocking acquisition (default: 100 ms).
    pub poll_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            key_prefix: "leasehold".to_owned(),
            default_lease: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl LockSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_lease.is_zero() {
            return Err("default lease must be positive".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        Ok(())
    }
}

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct LeaseholdConfig {
    /// Backing store topology, endpoints and credentials.
    #[serde(default)]
    pub store: ConnectionConfig,
    /// Health monitoring and reconnection.
    #[serde(default)]
    pub manager: ManagerConfig,
    /// Lock defaults.
    #[serde(default)]
    pub lock: LockConfig,
}

impl LeaseholdConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.manager
            .settings()
            .validate()
            .map_err(ConfigError::Invalid)?;
        self.lock.settings().validate().map_err(ConfigError::Invalid)
    }
}

/// `[manager]` section.
#[derive(Debug, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_seconds: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    #[serde(default = "default_sentinel_timeout_ms")]
    pub sentinel_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: default_health_check_interval(),
            max_retries: default_max_retries(),
            retry_interval_seconds: default_retry_interval(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            sentinel_timeout_ms: default_sentinel_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            pool_size: default_pool_size(),
        }
    }
}

impl ManagerConfig {
    pub fn settings(&self) -> ManagerSettings {
        ManagerSettings {
            health_check_interval: Duration::from_secs(self.health_check_interval_seconds),
            max_retries: self.max_retries,
            retry_interval: Duration::from_secs(self.retry_interval_seconds),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_seconds),
            redis: RedisOptions {
                pool_size: self.pool_size,
                connection_timeout: Duration::from_millis(self.connection_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
                sentinel_timeout: Duration::from_millis(self.sentinel_timeout_ms),
            },
        }
    }
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_interval() -> u64 {
    3
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_sentinel_timeout_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_connection_timeout_ms() -> u64 {
    5000
}

fn default_pool_size() -> usize {
    10
}

/// `[lock]` section.
#[derive(Debug, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_lease_seconds")]
    pub default_lease_seconds: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            default_lease_seconds: default_lease_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LockConfig {
    pub fn settings(&self) -> LockSettings {
        LockSettings {
            key_prefix: self.key_prefix.clone(),
            default_lease: Duration::from_secs(self.default_lease_seconds),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

fn default_key_prefix() -> String {
    "leasehold".to_owned()
}

fn default_lease_seconds() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    100
}
