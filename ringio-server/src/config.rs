use ringio_core::{NeighbourScheme, RingIntervals};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Pinned election id. Leave unset for a random draw; pin a large
    /// value on the designated bootstrap leader to make it win
    /// deterministically.
    #[serde(default)]
    pub id: Option<u64>,
    pub bind_addr: String,
    /// This node's position in ring order.
    pub index: u32,
    /// Total ring size at startup.
    pub node_count: u32,
    /// How ring positions map to peer addresses.
    pub neighbours: NeighbourScheme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_election_retry_secs")]
    pub election_retry_secs: u64,
    #[serde(default = "default_ping_secs")]
    pub ping_secs: u64,
    #[serde(default = "default_leader_down_retry_secs")]
    pub leader_down_retry_secs: u64,
    #[serde(default = "default_neighbour_give_up_secs")]
    pub neighbour_give_up_secs: u64,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

fn default_election_retry_secs() -> u64 {
    30
}

fn default_ping_secs() -> u64 {
    30
}

fn default_leader_down_retry_secs() -> u64 {
    30
}

fn default_neighbour_give_up_secs() -> u64 {
    600
}

fn default_send_timeout_secs() -> u64 {
    5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            election_retry_secs: default_election_retry_secs(),
            ping_secs: default_ping_secs(),
            leader_down_retry_secs: default_leader_down_retry_secs(),
            neighbour_give_up_secs: default_neighbour_give_up_secs(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl TimingConfig {
    pub fn intervals(&self) -> RingIntervals {
        RingIntervals {
            election_retry: Duration::from_secs(self.election_retry_secs),
            ping: Duration::from_secs(self.ping_secs),
            leader_down_retry: Duration::from_secs(self.leader_down_retry_secs),
            neighbour_give_up: Duration::from_secs(self.neighbour_give_up_secs),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Config {
    pub fn from_file(path: &str) -> ringio_core::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("RINGIO"))
            .build()
            .map_err(|e| ringio_core::RingError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ringio_core::RingError::Config(e.to_string()))?;

        if config.node.node_count == 0 {
            return Err(ringio_core::RingError::Config(
                "node_count must be at least 1".to_string(),
            ));
        }
        if config.node.index >= config.node.node_count {
            return Err(ringio_core::RingError::Config(format!(
                "node index {} out of range for ring of {}",
                config.node.index, config.node.node_count
            )));
        }

        Ok(config)
    }
}
