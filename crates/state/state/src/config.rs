use std::fmt;

use serde::Deserialize;

use crate::error::StoreError;
use crate::topology::ConnectionTopology;

/// A single `host:port` pair parsed from the configured host list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Connection settings for the backing store.
///
/// Supplied once when the connection manager is built and never mutated.
/// `host` may be a comma-separated list: sentinel nodes for
/// [`ConnectionTopology::Sentinel`], seed nodes for
/// [`ConnectionTopology::Cluster`].
///
/// # Example
///
/// ```toml
/// topology = "sentinel"
/// host = "10.0.0.1,10.0.0.2:26380"
/// port = 26379
/// master_group_name = "mymaster"
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Deployment shape. Also accepted under the key `cluster_mode`.
    #[serde(default, alias = "cluster_mode")]
    pub topology: ConnectionTopology,

    /// Host, or comma-separated host list with optional `:port` suffixes.
    #[serde(default = "default_host")]
    pub host: String,

    /// Default port for every host that omits one.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Slave host for [`ConnectionTopology::MasterSlave`]. Recorded only;
    /// reads are not routed to it.
    pub slave_host: Option<String>,

    /// Slave port for [`ConnectionTopology::MasterSlave`].
    pub slave_port: Option<u16>,

    /// Username for the data nodes.
    pub username: Option<String>,

    /// Password for the data nodes.
    pub password: Option<String>,

    /// Username for the sentinel nodes.
    pub sentinel_username: Option<String>,

    /// Password for the sentinel nodes.
    pub sentinel_password: Option<String>,

    /// Name of the monitored master group (sentinel only).
    #[serde(alias = "master_groupname")]
    pub master_group_name: Option<String>,

    /// Logical database index. Ignored by clusters.
    #[serde(default)]
    pub db: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            topology: ConnectionTopology::default(),
            host: default_host(),
            port: default_port(),
            slave_host: None,
            slave_port: None,
            username: None,
            password: None,
            sentinel_username: None,
            sentinel_password: None,
            master_group_name: None,
            db: 0,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    6379
}

impl ConnectionConfig {
    /// Standalone configuration for a single `host:port`.
    pub fn standalone(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Parse the host list into endpoints, filling in the default port.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, StoreError> {
        let endpoints = self
            .host
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|seed| parse_endpoint(seed, self.port))
            .collect::<Result<Vec<_>, _>>()?;

        if endpoints.is_empty() {
            return Err(StoreError::Config("no store host configured".into()));
        }
        Ok(endpoints)
    }

    /// Check that the fields required by the selected topology are present.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.port == 0 {
            return Err(StoreError::Config("store port must be non-zero".into()));
        }
        let endpoints = self.endpoints()?;

        match self.topology {
            ConnectionTopology::Sentinel => {
                if self
                    .master_group_name
                    .as_deref()
                    .is_none_or(|name| name.trim().is_empty())
                {
                    return Err(StoreError::Config(
                        "sentinel topology requires master_group_name".into(),
                    ));
                }
            }
            ConnectionTopology::Standalone | ConnectionTopology::MasterSlave => {
                if endpoints.len() > 1 {
                    return Err(StoreError::Config(format!(
                        "{} topology takes a single host, got {}",
                        self.topology,
                        endpoints.len()
                    )));
                }
            }
            ConnectionTopology::Cluster => {}
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("ConnectionConfig")
            .field("topology", &self.topology)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("slave_host", &self.slave_host)
            .field("slave_port", &self.slave_port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("sentinel_username", &self.sentinel_username)
            .field("sentinel_password", &redact(&self.sentinel_password))
            .field("master_group_name", &self.master_group_name)
            .field("db", &self.db)
            .finish()
    }
}

/// Parse `host`, `host:port`, `[v6]` or `[v6]:port`.
fn parse_endpoint(seed: &str, default_port: u16) -> Result<Endpoint, StoreError> {
    let bad_port =
        |p: &str| StoreError::Config(format!("invalid port in store host {seed:?}: {p}"));

    if let Some(rest) = seed.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| StoreError::Config(format!("unterminated IPv6 host: {seed:?}")))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| bad_port(p))?,
            None if tail.is_empty() => default_port,
            None => return Err(bad_port(tail)),
        };
        return Ok(Endpoint::new(host, port));
    }

    match seed.rsplit_once(':') {
        // A bare IPv6 address without brackets cannot carry a port.
        Some((host, _)) if host.contains(':') => Ok(Endpoint::new(seed, default_port)),
        Some((host, p)) => Ok(Endpoint::new(host, p.parse().map_err(|_| bad_port(p))?)),
        None => Ok(Endpoint::new(seed, default_port)),
    }
}
