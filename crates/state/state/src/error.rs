use thiserror::Error;

/// Errors from lease store handles and connectors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("store handle is closed")]
    Closed,

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the error points at the connection rather than the request.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_) | Self::Closed)
    }
}
