use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Deployment shape of the backing store.
///
/// Chosen once from configuration and fixed for the life of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionTopology {
    /// A single server; primary and secondary are the same handle.
    #[default]
    Standalone,
    /// Sentinel-supervised master with replicas.
    Sentinel,
    /// Clustered deployment reached through a list of seed nodes.
    Cluster,
    /// Master with a configured slave. Wired exactly like [`Standalone`]:
    /// one pool serves reads and writes.
    ///
    /// [`Standalone`]: ConnectionTopology::Standalone
    #[serde(alias = "master_slave", alias = "masterslave")]
    MasterSlave,
}

impl ConnectionTopology {
    /// Return the canonical configuration string for this topology.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Sentinel => "sentinel",
            Self::Cluster => "cluster",
            Self::MasterSlave => "master-slave",
        }
    }

    /// Whether the topology resolves a distinct read-only handle.
    pub fn has_read_replica(&self) -> bool {
        matches!(self, Self::Sentinel)
    }
}

impl fmt::Display for ConnectionTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionTopology {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "standalone" => Ok(Self::Standalone),
            "sentinel" => Ok(Self::Sentinel),
            "cluster" => Ok(Self::Cluster),
            "master-slave" | "master_slave" | "masterslave" => Ok(Self::MasterSlave),
            other => Err(StoreError::Config(format!(
                "unsupported store topology: {other}"
            ))),
        }
    }
}
