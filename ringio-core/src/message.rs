use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Partition label assigned to every node by the leader after election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
}

/// Protocol message circulating around the ring. Every variant carries the
/// id of the node that started the message's journey (`origin_id`) and the
/// id of the node that last forwarded it (`sender_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Ping {
        origin_id: u64,
        sender_id: u64,
    },
    ElectionRound {
        origin_id: u64,
        sender_id: u64,
    },
    LeaderElected {
        origin_id: u64,
        sender_id: u64,
    },
    LeaderDown {
        origin_id: u64,
        sender_id: u64,
    },
    NodeDown {
        origin_id: u64,
        sender_id: u64,
    },
    CollectIds {
        origin_id: u64,
        sender_id: u64,
        ids: Vec<u64>,
    },
    Coloring {
        origin_id: u64,
        sender_id: u64,
        #[serde(with = "id_keys")]
        colors: BTreeMap<u64, Color>,
    },
}

/// JSON object keys are strings, and the buffering that internally tagged
/// enums deserialize through keeps them that way, so the coloring map
/// serializes its node-id keys as strings and parses them back itself.
mod id_keys {
    use super::Color;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(colors: &BTreeMap<u64, Color>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(colors.iter().map(|(id, color)| (id.to_string(), color)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u64, Color>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Color>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(id, color)| {
                let id = id
                    .parse::<u64>()
                    .map_err(|_| D::Error::custom(format!("invalid node id key: {}", id)))?;
                Ok((id, color))
            })
            .collect()
    }
}

impl Message {
    pub fn ping(origin_id: u64) -> Self {
        Message::Ping {
            origin_id,
            sender_id: origin_id,
        }
    }

    pub fn election_round(origin_id: u64) -> Self {
        Message::ElectionRound {
            origin_id,
            sender_id: origin_id,
        }
    }

    pub fn leader_elected(origin_id: u64) -> Self {
        Message::LeaderElected {
            origin_id,
            sender_id: origin_id,
        }
    }

    pub fn leader_down(origin_id: u64) -> Self {
        Message::LeaderDown {
            origin_id,
            sender_id: origin_id,
        }
    }

    pub fn node_down(origin_id: u64) -> Self {
        Message::NodeDown {
            origin_id,
            sender_id: origin_id,
        }
    }

    /// A fresh collection round, seeded with the originator's own id.
    pub fn collect_ids(origin_id: u64) -> Self {
        Message::CollectIds {
            origin_id,
            sender_id: origin_id,
            ids: vec![origin_id],
        }
    }

    pub fn coloring(origin_id: u64, colors: BTreeMap<u64, Color>) -> Self {
        Message::Coloring {
            origin_id,
            sender_id: origin_id,
            colors,
        }
    }

    pub fn origin_id(&self) -> u64 {
        match self {
            Message::Ping { origin_id, .. }
            | Message::ElectionRound { origin_id, .. }
            | Message::LeaderElected { origin_id, .. }
            | Message::LeaderDown { origin_id, .. }
            | Message::NodeDown { origin_id, .. }
            | Message::CollectIds { origin_id, .. }
            | Message::Coloring { origin_id, .. } => *origin_id,
        }
    }

    pub fn sender_id(&self) -> u64 {
        match self {
            Message::Ping { sender_id, .. }
            | Message::ElectionRound { sender_id, .. }
            | Message::LeaderElected { sender_id, .. }
            | Message::LeaderDown { sender_id, .. }
            | Message::NodeDown { sender_id, .. }
            | Message::CollectIds { sender_id, .. }
            | Message::Coloring { sender_id, .. } => *sender_id,
        }
    }

    pub fn set_sender(&mut self, id: u64) {
        match self {
            Message::Ping { sender_id, .. }
            | Message::ElectionRound { sender_id, .. }
            | Message::LeaderElected { sender_id, .. }
            | Message::LeaderDown { sender_id, .. }
            | Message::NodeDown { sender_id, .. }
            | Message::CollectIds { sender_id, .. }
            | Message::Coloring { sender_id, .. } => *sender_id = id,
        }
    }
}

/// Two-valued inbound result. `ElectionStale` is the dedicated reply for an
/// election message rejected because a leader already exists; the HTTP layer
/// maps it to 201 against the normal 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Accepted,
    ElectionStale,
}

/// Acknowledgment returned for every handled message, carrying the
/// responding node's own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub node_id: u64,
    pub status: AckStatus,
}
