//! Configuration for a beaconkv node
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file
//! (path from `BEACONKV_CONFIG`, default `beaconkv.toml`), then environment
//! variables (`NODE_ID`, `PEERS`, `COORD_PORT`, ...). The node binary applies
//! its CLI flags on top.

use crate::common::{offset_port, Error, NodeId, PeerSet, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "BEACONKV_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "beaconkv.toml";

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// This node's id
    #[serde(default = "default_node_id")]
    pub node_id: NodeId,

    /// Peer hostnames, in probe order
    #[serde(default)]
    pub peers: Vec<String>,

    /// Coordination port shared by every node
    #[serde(default = "default_coord_port")]
    pub coord_port: u16,

    /// Interface the HTTP server binds to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Liveness probe period
    #[serde(default = "default_probe_interval")]
    pub probe_interval_ms: u64,

    /// Per-probe round-trip bound
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Leadership resolution period
    #[serde(default = "default_election_interval")]
    pub election_interval_ms: u64,

    /// Maximum last-seen age for a peer to count as alive
    #[serde(default = "default_staleness")]
    pub staleness_ms: u64,

    /// Per-call bound on outbound replication
    #[serde(default = "default_replication_timeout")]
    pub replication_timeout_ms: u64,

    /// How redirect targets are built for non-leader writes
    #[serde(default)]
    pub redirect: RedirectConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_node_id() -> NodeId {
    1
}
fn default_coord_port() -> u16 {
    7000
}
fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn default_probe_interval() -> u64 {
    1000
}
fn default_probe_timeout() -> u64 {
    2000
}
fn default_election_interval() -> u64 {
    2000
}
fn default_staleness() -> u64 {
    5000
}
fn default_replication_timeout() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_redirect_host() -> String {
    "localhost".to_string()
}

/// Redirect target construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RedirectConfig {
    /// `http://<leader-host>:<coord_port>`, from the peer list
    #[default]
    Peer,
    /// `http://<host>:<base_port + leader_id>`, for published container ports
    PortOffset {
        #[serde(default = "default_redirect_host")]
        host: String,
        /// Defaults to the coordination port
        #[serde(default)]
        base_port: Option<u16>,
    },
}

/// Loop periods and network bounds, as durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub election_interval: Duration,
    pub staleness: Duration,
    pub replication_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(default_probe_interval()),
            probe_timeout: Duration::from_millis(default_probe_timeout()),
            election_interval: Duration::from_millis(default_election_interval()),
            staleness: Duration::from_millis(default_staleness()),
            replication_timeout: Duration::from_millis(default_replication_timeout()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            peers: Vec::new(),
            coord_port: default_coord_port(),
            bind_host: default_bind_host(),
            probe_interval_ms: default_probe_interval(),
            probe_timeout_ms: default_probe_timeout(),
            election_interval_ms: default_election_interval(),
            staleness_ms: default_staleness(),
            replication_timeout_ms: default_replication_timeout(),
            redirect: RedirectConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the config file named by `BEACONKV_CONFIG` plus the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(Some(&path), true)
    }

    /// Load from an optional file, optionally layering environment variables.
    /// A missing file is not an error.
    pub fn load_from(path: Option<&Path>, with_env: bool) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        if with_env {
            builder = builder.add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("peers"),
            );
        }
        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Check the invariants the coordinator relies on.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("probe_interval_ms", self.probe_interval_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("election_interval_ms", self.election_interval_ms),
            ("staleness_ms", self.staleness_ms),
            ("replication_timeout_ms", self.replication_timeout_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidConfig(format!("{} must be positive", name)));
        }
        if self.staleness_ms <= self.probe_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "staleness_ms ({}) must exceed probe_interval_ms ({})",
                self.staleness_ms, self.probe_interval_ms
            )));
        }
        if self.coord_port == 0 {
            return Err(Error::InvalidConfig("coord_port must be set".into()));
        }
        let peers = self.peer_set()?;
        if let RedirectConfig::PortOffset { base_port, .. } = &self.redirect {
            let base = base_port.unwrap_or(self.coord_port);
            let ids = std::iter::once(self.node_id).chain(peers.iter().map(|p| p.id));
            for id in ids {
                if offset_port(base, id).is_none() {
                    return Err(Error::InvalidConfig(format!(
                        "node {} has no redirect port: {} + {} exceeds 65535",
                        id, base, id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn peer_set(&self) -> Result<PeerSet> {
        PeerSet::parse(&self.peers, self.coord_port, self.node_id)
    }

    pub fn timing(&self) -> Timing {
        Timing {
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            election_interval: Duration::from_millis(self.election_interval_ms),
            staleness: Duration::from_millis(self.staleness_ms),
            replication_timeout: Duration::from_millis(self.replication_timeout_ms),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.coord_port)
    }
}
