//! Shared test support: a scripted in-memory peer channel and a node
//! factory with intervals short enough for tests.

use crate::channel::PeerChannel;
use crate::error::{Result, RingError};
use crate::message::{Ack, AckStatus, Message};
use crate::node::{RingIntervals, RingNode};
use crate::topology::{NeighbourScheme, PeerAddr, RingTopology};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum ScriptedReply {
    Ack(u64),
    Failure(String),
}

/// Records every outbound send and answers from a scripted reply queue;
/// once the queue is drained every send is acknowledged by node id 0.
pub(crate) struct MockChannel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    sent: Mutex<Vec<(PeerAddr, Message)>>,
}

impl MockChannel {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_ack(&self, node_id: u64) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Ack(node_id));
    }

    pub(crate) fn push_failure(&self, reason: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Failure(reason.to_string()));
    }

    pub(crate) fn sent(&self) -> Vec<(PeerAddr, Message)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerChannel for MockChannel {
    async fn send(&self, addr: &PeerAddr, message: &Message) -> Result<Ack> {
        self.sent
            .lock()
            .unwrap()
            .push((addr.clone(), message.clone()));
        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptedReply::Ack(node_id)) => Ok(Ack {
                node_id,
                status: AckStatus::Accepted,
            }),
            Some(ScriptedReply::Failure(reason)) => Err(RingError::Http(reason)),
            None => Ok(Ack {
                node_id: 0,
                status: AckStatus::Accepted,
            }),
        }
    }
}

/// A node at `self_index` of a port-stride ring on 127.0.0.1:5000+, with
/// millisecond-scale intervals.
pub(crate) fn ring_node(id: u64, node_count: u32, self_index: u32) -> (RingNode, Arc<MockChannel>) {
    let scheme = NeighbourScheme::PortStride {
        host: "127.0.0.1".to_string(),
        base_port: 5000,
    };
    let topology = RingTopology::new(scheme, node_count, self_index);
    let intervals = RingIntervals {
        election_retry: Duration::from_millis(20),
        ping: Duration::from_millis(20),
        leader_down_retry: Duration::from_millis(20),
        neighbour_give_up: Duration::from_millis(100),
    };
    let channel = Arc::new(MockChannel::new());
    let node = RingNode::new(id, topology, intervals, channel.clone());
    (node, channel)
}
