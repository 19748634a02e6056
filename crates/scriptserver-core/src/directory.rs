//! Named RF test endpoints.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::DirectoryError;

/// A test endpoint: a host with an ack-listener port and a backbone send port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfNode {
    pub host: String,
    pub ack_port: u16,
    pub send_port: u16,
}

impl FromStr for RfNode {
    type Err = DirectoryError;

    /// Parse the `host ack_port send_port` triple.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [host, ack, send] = parts.as_slice() else {
            return Err(DirectoryError::Malformed(s.to_string()));
        };
        let port = |p: &str| p.parse::<u16>().map_err(|_| DirectoryError::Port(p.to_string()));
        Ok(Self {
            host: host.to_string(),
            ack_port: port(*ack)?,
            send_port: port(*send)?,
        })
    }
}

/// Node name to endpoint map, filled once at startup.
#[derive(Debug, Clone, Default)]
pub struct NodeDirectory {
    nodes: BTreeMap<String, RfNode>,
}

impl NodeDirectory {
    pub fn new(nodes: BTreeMap<String, RfNode>) -> Self {
        Self { nodes }
    }

    pub fn get(&self, name: &str) -> Option<&RfNode> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<(String, RfNode)> for NodeDirectory {
    fn from_iter<I: IntoIterator<Item = (String, RfNode)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}
