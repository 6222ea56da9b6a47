//! Node configuration loaded from a YAML file.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod network;

pub use error::{Error, Result};
pub use network::{GLOBAL_ALIAS, LOCAL_ALIAS, SITE_ALIAS, resolve_host};

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use minicluster_discovery::{
    DEFAULT_BASE_PORT, DEFAULT_PAIR_COUNT, PortPair, ProbePolicy, port_pairs,
};
use minicluster_topology::NodeIdentity;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

/// Settings for the local node.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSettings {
    /// Node name, unique cluster-wide.
    pub name: String,
}

/// Settings for the cluster being founded or joined.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSettings {
    /// Cluster name.
    pub name: String,

    /// Accepted for compatibility; bootstrap never reads it.
    pub initial_master_nodes: Vec<String>,
}

/// Settings for peer discovery.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoverySettings {
    /// Hosts scanned for running peers.
    pub seed_hosts: Vec<String>,

    /// First peer port scanned.
    pub base_port: u16,

    /// Number of port pairs scanned per host.
    pub port_pairs: usize,

    /// How bind failures other than "in use" are treated.
    pub probe_policy: ProbePolicy,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            seed_hosts: vec!["127.0.0.1".to_string()],
            base_port: DEFAULT_BASE_PORT,
            port_pairs: DEFAULT_PAIR_COUNT,
            probe_policy: ProbePolicy::default(),
        }
    }
}

/// Settings for the address this node advertises.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    /// IP address or one of the `_local_`, `_site_`, `_global_` aliases.
    pub host: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host: LOCAL_ALIAS.to_string(),
        }
    }
}

/// Settings for the transport ports.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSettings {
    /// Peer port. The client port is the one after it.
    pub port: u16,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_BASE_PORT,
        }
    }
}

/// Settings for joining a running cluster.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapSettings {
    /// Seconds allowed for connecting to discovered peers.
    pub dial_timeout_secs: u64,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            dial_timeout_secs: 10,
        }
    }
}

/// Settings for the consensus engine process.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Seconds the engine has to become ready.
    pub ready_timeout_secs: u64,

    /// Directory holding the engine binary. Looked up on `PATH` when unset.
    pub bin_dir: Option<PathBuf>,

    /// Parent of every node's data directory.
    pub data_root: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 60,
            bin_dir: None,
            data_root: PathBuf::from("data"),
        }
    }
}

/// Settings for leaving the cluster.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownSettings {
    /// Attempts at removing this node from the cluster.
    pub removal_attempts: u32,

    /// Milliseconds between removal attempts.
    pub removal_backoff_ms: u64,

    /// Whether a failed removal fails the run.
    pub removal_required: bool,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            removal_attempts: 3,
            removal_backoff_ms: 500,
            removal_required: false,
        }
    }
}

/// Settings for logging.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete node configuration.
///
/// Obtain one through [`Config::from_file`] or [`Config::from_yaml`]; both
/// validate, so accessors on a loaded config only fail on values that
/// cannot be checked ahead of time.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Local node settings.
    pub node: NodeSettings,

    /// Cluster settings.
    pub cluster: ClusterSettings,

    /// Discovery settings.
    pub discovery: DiscoverySettings,

    /// Network settings.
    pub network: NetworkSettings,

    /// Transport settings.
    pub transport: TransportSettings,

    /// Bootstrap settings.
    pub bootstrap: BootstrapSettings,

    /// Engine settings.
    pub engine: EngineSettings,

    /// Shutdown settings.
    pub shutdown: ShutdownSettings,

    /// Logging settings.
    pub log: LogSettings,
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&contents)
    }

    /// Parses and validates configuration from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;

        if !config.cluster.initial_master_nodes.is_empty() {
            warn!(
                nodes = ?config.cluster.initial_master_nodes,
                "cluster.initial_master_nodes is set but has no effect on bootstrap"
            );
        }

        Ok(config)
    }

    /// Checks every value that can be checked without touching the network.
    ///
    /// # Errors
    ///
    /// Returns the first invalid or missing value.
    pub fn validate(&self) -> Result<()> {
        if self.node.name.is_empty() {
            return Err(Error::Missing("node.name"));
        }

        // Names are embedded in `name=url,name=url` strings
        if self.node.name.contains(['=', ',']) {
            return Err(Error::Invalid {
                key: "node.name",
                reason: "must not contain '=' or ','".to_string(),
            });
        }

        if self.cluster.name.is_empty() {
            return Err(Error::Missing("cluster.name"));
        }

        if self.discovery.seed_hosts.is_empty() {
            return Err(Error::Invalid {
                key: "discovery.seed_hosts",
                reason: "at least one seed host is required".to_string(),
            });
        }

        self.port_pairs()?;
        self.host()?;

        if self.transport.port == 0 || self.transport.port == u16::MAX {
            return Err(Error::Invalid {
                key: "transport.port",
                reason: format!(
                    "{} leaves no room for the client port after it",
                    self.transport.port
                ),
            });
        }

        if self.shutdown.removal_attempts == 0 {
            return Err(Error::Invalid {
                key: "shutdown.removal_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.engine.ready_timeout_secs == 0 {
            return Err(Error::Invalid {
                key: "engine.ready_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.bootstrap.dial_timeout_secs == 0 {
            return Err(Error::Invalid {
                key: "bootstrap.dial_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// The resolved `network.host` address.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address or known alias.
    pub fn host(&self) -> Result<IpAddr> {
        resolve_host(&self.network.host)
    }

    /// Port pairs scanned on every seed host.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty or runs past the last port.
    pub fn port_pairs(&self) -> Result<Vec<PortPair>> {
        port_pairs(self.discovery.base_port, self.discovery.port_pairs).map_err(|e| {
            Error::Invalid {
                key: "discovery.port_pairs",
                reason: e.to_string(),
            }
        })
    }

    /// This node's peer URL, on `transport.port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is invalid.
    pub fn peer_url(&self) -> Result<Url> {
        self.transport_url(self.transport.port)
    }

    /// This node's client URL, on the port after `transport.port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is invalid or the port overflows.
    pub fn client_url(&self) -> Result<Url> {
        let port = self
            .transport
            .port
            .checked_add(1)
            .ok_or_else(|| Error::Invalid {
                key: "transport.port",
                reason: "client port overflows".to_string(),
            })?;

        self.transport_url(port)
    }

    fn transport_url(&self, port: u16) -> Result<Url> {
        let addr = SocketAddr::new(self.host()?, port);

        Ok(Url::parse(&format!("http://{addr}"))?)
    }

    /// Builds this node's identity. The id stays unset until the engine
    /// reports it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport URLs cannot be built.
    pub fn identity(&self) -> Result<NodeIdentity> {
        Ok(NodeIdentity::new(
            self.node.name.clone(),
            self.cluster.name.clone(),
            self.peer_url()?,
            self.client_url()?,
            &self.engine.data_root,
        ))
    }

    /// Time allowed for connecting to discovered peers.
    #[must_use]
    pub const fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap.dial_timeout_secs)
    }

    /// Time the engine has to become ready.
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.ready_timeout_secs)
    }

    /// Pause between self-removal attempts.
    #[must_use]
    pub const fn removal_backoff(&self) -> Duration {
        Duration::from_millis(self.shutdown.removal_backoff_ms)
    }
}
