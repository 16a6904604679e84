//! Redis backend for leasehold.
//!
//! This crate provides a Redis-backed [`LeaseStore`] and a [`StoreConnector`]
//! that wires it for each supported deployment topology.
//!
//! # Features
//!
//! - **Leases**: `SET NX PX` for acquisition; Lua scripts for
//!   compare-and-delete and compare-and-extend so ownership is checked and
//!   acted on in one server-side step.
//! - **Topologies**: standalone, master-slave, sentinel and cluster.
//! - **Connection pooling**: `deadpool-redis` for single-server topologies.
//!
//! # Lease Consistency
//!
//! | Deployment | Mutual Exclusion | Notes |
//! |------------|------------------|-------|
//! | Standalone / master-slave | Strong | Full mutual exclusion while the master is up |
//! | Sentinel | Weak | A lease may be lost during failover |
//! | Cluster | Weak | A lease may be lost during failover |
//!
//! Replication is asynchronous. If the master fails right after a lease is
//! written and before the write reaches a replica, the promoted replica does
//! not know about the lease and a second holder can acquire it.
//!
//! # Example
//!
//! ```ignore
//! use leasehold_state::{ConnectionConfig, StoreConnector};
//! use leasehold_state_redis::{RedisConnector, RedisOptions};
//!
//! let connector = RedisConnector::new(RedisOptions::default());
//! let handles = connector.connect(&ConnectionConfig::standalone("localhost", 6379)).await?;
//! handles.primary.ping().await?;
//! ```
//!
//! [`LeaseStore`]: leasehold_state::LeaseStore
//! [`StoreConnector`]: leasehold_state::StoreConnector

mod config;
mod connector;
mod scripts;
mod store;

pub use config::RedisOptions;
pub use connector::RedisConnector;
pub use store::RedisStore;
