//! TOML-based configuration for the script server.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use scriptserver_core::{NodeDirectory, RfNode};

use crate::error::NodeError;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Node name to `"host ack_port send_port"`.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeEntry>,
    /// Named constants usable as `{NAME}` placeholders.
    #[serde(default)]
    pub export: BTreeMap<String, String>,
}

/// A `[nodes]` value, validated while the file is read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct NodeEntry(pub RfNode);

impl TryFrom<String> for NodeEntry {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map(NodeEntry).map_err(|e| e.to_string())
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    pub fn node_directory(&self) -> NodeDirectory {
        self.nodes
            .iter()
            .map(|(name, entry)| (name.clone(), entry.0.clone()))
            .collect()
    }
}

/// The `[runner]` section.
#[derive(Debug, Deserialize)]
pub struct RunnerSection {
    /// Seconds to wait when a line leaves its timeout empty.
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,
    /// Pause between repetitions of a looped send.
    #[serde(default = "default_loop_delay_ms")]
    pub loop_delay_ms: u64,
    /// Discarded datagrams tolerated by a single wait.
    #[serde(default = "default_max_dropped")]
    pub max_dropped: usize,
    /// Address the ack listeners bind to.
    #[serde(default = "default_listen_host")]
    pub listen_host: IpAddr,
}

fn default_timeout() -> u64 {
    600
}

fn default_loop_delay_ms() -> u64 {
    2000
}

fn default_max_dropped() -> usize {
    1024
}

fn default_listen_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

impl RunnerSection {
    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            loop_delay_ms: default_loop_delay_ms(),
            max_dropped: default_max_dropped(),
            listen_host: default_listen_host(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Copy log output to this file as well as stdout.
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}
