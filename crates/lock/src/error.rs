use std::time::Duration;

use thiserror::Error;

use leasehold_state::StoreError;

/// Errors from lock operations.
///
/// Contention and ownership loss are not errors: they surface as `false`.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock key must not be empty")]
    InvalidKey,

    #[error("lease duration must be positive, got {0:?}")]
    InvalidLease(Duration),

    #[error("lock not acquired: {key}")]
    NotAcquired { key: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while building a [`ConnectionManager`].
///
/// [`ConnectionManager`]: crate::ConnectionManager
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid connection configuration: {0}")]
    Config(String),

    #[error("initial connection failed: {0}")]
    Connect(#[source] StoreError),
}

impl From<StoreError> for ConnectError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Config(msg) => Self::Config(msg),
            other => Self::Connect(other),
        }
    }
}

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
