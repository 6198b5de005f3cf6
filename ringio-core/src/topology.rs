use serde::{Deserialize, Serialize};
use std::fmt;

/// Reachable address of a peer node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How ring positions map to addresses. Two deployment shapes are
/// supported: all nodes on one host with adjacent ports, or one node per
/// host on a shared subnet with the ring index encoded in the last octet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NeighbourScheme {
    /// Node `i` listens on `host:base_port + i`.
    PortStride { host: String, base_port: u16 },
    /// Node `i` lives at `prefix.(offset + 1 + i)` on a fixed port.
    SubnetOctet {
        prefix: String,
        offset: u8,
        port: u16,
    },
}

impl NeighbourScheme {
    pub fn address(&self, index: u32) -> PeerAddr {
        match self {
            NeighbourScheme::PortStride { host, base_port } => {
                PeerAddr::new(host.clone(), base_port + index as u16)
            }
            NeighbourScheme::SubnetOctet {
                prefix,
                offset,
                port,
            } => {
                let octet = *offset as u32 + 1 + index;
                PeerAddr::new(format!("{}.{}", prefix, octet), *port)
            }
        }
    }
}

/// This node's place in the ring and its current right-neighbour pointer.
///
/// `node_count` is fixed at startup and never shrinks: after repeated
/// failures the advance arithmetic keeps cycling through the same index
/// space, dead addresses included. Single-neighbour failure is the only
/// repair this structure supports.
#[derive(Debug, Clone)]
pub struct RingTopology {
    scheme: NeighbourScheme,
    node_count: u32,
    self_index: u32,
    neighbour_index: u32,
}

impl RingTopology {
    pub fn new(scheme: NeighbourScheme, node_count: u32, self_index: u32) -> Self {
        let neighbour_index = (self_index + 1) % node_count;
        Self {
            scheme,
            node_count,
            self_index,
            neighbour_index,
        }
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn self_address(&self) -> PeerAddr {
        self.scheme.address(self.self_index)
    }

    pub fn right_neighbour(&self) -> PeerAddr {
        self.scheme.address(self.neighbour_index)
    }

    /// Skip the current right neighbour, moving the pointer one position
    /// further in ring order. Returns false when no distinct candidate is
    /// left, i.e. the ring has degenerated to this node alone.
    pub fn advance_right_neighbour(&mut self) -> bool {
        let mut next = (self.neighbour_index + 1) % self.node_count;
        if next == self.self_index {
            next = (next + 1) % self.node_count;
        }
        if next == self.neighbour_index || next == self.self_index {
            return false;
        }
        self.neighbour_index = next;
        true
    }
}
