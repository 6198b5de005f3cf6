use crate::channel::PeerChannel;
use crate::error::Result;
use crate::message::{Ack, AckStatus, Color, Message};
use crate::state::NodeState;
use crate::timer::TimerRegistry;
use crate::topology::RingTopology;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Timer driving the self-originated election rounds.
pub const ELECTION_TIMER: &str = "election_init";
/// Timer driving the periodic right-neighbour liveness ping.
pub const PING_TIMER: &str = "ping";
/// Timer driving the leader-down notification retry loop.
pub const LEADER_DOWN_TIMER: &str = "leader_down";

/// Tunable protocol intervals. Reference deployment values are the
/// defaults; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct RingIntervals {
    pub election_retry: Duration,
    pub ping: Duration,
    pub leader_down_retry: Duration,
    /// Cumulative send-failure wait after which the right neighbour is
    /// treated as dead and skipped.
    pub neighbour_give_up: Duration,
}

impl Default for RingIntervals {
    fn default() -> Self {
        Self {
            election_retry: Duration::from_secs(30),
            ping: Duration::from_secs(30),
            leader_down_retry: Duration::from_secs(30),
            neighbour_give_up: Duration::from_secs(600),
        }
    }
}

/// Read-only view of the node state, served by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RingSnapshot {
    pub id: u64,
    pub leader_id: Option<u64>,
    pub color: Option<Color>,
    pub right_neighbour: String,
    pub right_neighbour_id: Option<u64>,
    pub round_trip_made: bool,
}

/// One peer process in the ring. Inbound protocol messages arrive through
/// [`RingNode::handle`]; timer callbacks are the only other event source.
/// Both funnel every state mutation through the single state lock, and
/// sends always happen after the lock is released.
#[derive(Clone)]
pub struct RingNode {
    pub(crate) id: u64,
    pub(crate) intervals: RingIntervals,
    pub(crate) state: Arc<Mutex<NodeState>>,
    pub(crate) timers: Arc<TimerRegistry>,
    pub(crate) channel: Arc<dyn PeerChannel>,
}

impl RingNode {
    pub fn new(
        id: u64,
        topology: RingTopology,
        intervals: RingIntervals,
        channel: Arc<dyn PeerChannel>,
    ) -> Self {
        Self {
            id,
            intervals,
            state: Arc::new(Mutex::new(NodeState::new(topology))),
            timers: Arc::new(TimerRegistry::new()),
            channel,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Arm the initial election round. Called once at process startup.
    pub fn start(&self) {
        self.arm_election_timer(false);
    }

    pub async fn snapshot(&self) -> RingSnapshot {
        let state = self.state.lock().await;
        RingSnapshot {
            id: self.id,
            leader_id: state.leader_id,
            color: state.color,
            right_neighbour: state.topology.right_neighbour().to_string(),
            right_neighbour_id: state.right_neighbour_id,
            round_trip_made: state.round_trip_made,
        }
    }

    /// Dispatch one inbound protocol message. Never fails: every transport
    /// problem downstream of a handler is absorbed into the node's own
    /// state machine.
    pub async fn handle(&self, message: Message) -> Ack {
        match message {
            Message::Ping { .. } => self.accepted(),
            Message::ElectionRound { origin_id, .. } => {
                self.handle_election_round(origin_id).await
            }
            Message::LeaderElected { origin_id, .. } => {
                self.handle_leader_elected(origin_id).await
            }
            Message::LeaderDown { origin_id, .. } => self.handle_leader_down(origin_id).await,
            Message::NodeDown { origin_id, .. } => self.handle_node_down(origin_id).await,
            Message::CollectIds { origin_id, ids, .. } => {
                self.handle_collect_ids(origin_id, ids).await
            }
            Message::Coloring {
                origin_id, colors, ..
            } => self.handle_coloring(origin_id, colors).await,
        }
    }

    pub(crate) fn accepted(&self) -> Ack {
        Ack {
            node_id: self.id,
            status: AckStatus::Accepted,
        }
    }

    pub(crate) fn election_stale(&self) -> Ack {
        Ack {
            node_id: self.id,
            status: AckStatus::ElectionStale,
        }
    }

    /// Send to the current right neighbour, resolving the address outside
    /// of any send so the state lock is never held across the wire call.
    pub(crate) async fn send_to_right(&self, message: &Message) -> Result<Ack> {
        let addr = {
            let state = self.state.lock().await;
            state.topology.right_neighbour()
        };
        self.channel.send(&addr, message).await
    }

    /// Forward a circulating message with our own id stamped as the
    /// sender. Forward failures are logged and swallowed; the ping loop is
    /// what detects a dead neighbour.
    pub(crate) async fn forward(&self, mut message: Message) {
        message.set_sender(self.id);
        if let Err(error) = self.send_to_right(&message).await {
            tracing::warn!("could not forward message: {}", error);
        }
    }
}
