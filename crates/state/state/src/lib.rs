//! Store abstractions for leasehold.
//!
//! Defines the deployment [`ConnectionTopology`] and [`ConnectionConfig`],
//! the [`LeaseStore`] handle trait with the primitives lease-based locking
//! needs, and the [`StoreConnector`] that builds a primary/secondary pair of
//! handles. Backends live in `leasehold-state-memory` and
//! `leasehold-state-redis`; [`testing`] holds the conformance suite they
//! share.

pub mod config;
pub mod error;
pub mod key;
pub mod store;
pub mod testing;
pub mod topology;

pub use config::{ConnectionConfig, Endpoint};
pub use error::StoreError;
pub use key::LockKey;
pub use store::{LeaseStore, StoreConnector, StoreHandles};
pub use topology::ConnectionTopology;
