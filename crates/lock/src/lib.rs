//! Resilient store connection manager and auto-renewing distributed lock.
//!
//! [`ConnectionManager`] owns the handles to the backing store, probes them
//! on an interval and reconnects with a bounded number of attempts when a
//! probe fails. [`DistributedLock`] builds lease-based mutual exclusion on
//! top of it: a lock is a key holding the acquirer's fencing token with the
//! lease as its TTL, released and renewed only by compare-and-delete and
//! compare-and-extend against that token.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use leasehold_lock::{AcquireOptions, ConnectionManager, DistributedLock, LeaseholdConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LeaseholdConfig::load("leasehold.toml")?;
//! let manager = Arc::new(ConnectionManager::from_config(&config).await?);
//! let lock = DistributedLock::with_settings(Arc::clone(&manager), config.lock.settings());
//!
//! let opts = AcquireOptions::new()
//!     .lease(Duration::from_secs(30))
//!     .auto_renew(true);
//! lock.scoped("job:42", opts, || async {
//!     // critical section
//! })
//! .await?;
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod lock;
mod manager;
mod monitor;
mod state;
mod watchdog;

pub use config::{LeaseholdConfig, LockSettings, ManagerSettings};
pub use error::{ConfigError, ConnectError, LockError};
pub use lock::{AcquireOptions, DistributedLock};
pub use manager::ConnectionManager;

pub use leasehold_state::{ConnectionConfig, ConnectionTopology, LeaseStore, StoreError};
