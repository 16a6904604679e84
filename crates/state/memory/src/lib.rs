//! In-memory lease store for leasehold.
//!
//! [`MemoryBackend`] plays the part of the server: it owns the data and can be
//! taken offline. [`MemoryStore`] is a handle onto it and [`MemoryConnector`]
//! builds handles the way a network connector would, with knobs to refuse
//! connection attempts. Expiry follows `tokio::time`, so paused-clock tests
//! can move leases forward with `tokio::time::advance`.

mod connector;
mod store;

pub use connector::MemoryConnector;
pub use store::{MemoryBackend, MemoryStore};
