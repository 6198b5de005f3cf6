//! Failure detection and ring repair: the periodic ping loop, the
//! neighbour-skipping recovery procedure, and the leader-down cycle that
//! invalidates every node's cached leader before a fresh election.

use crate::message::{Ack, Color, Message};
use crate::node::{RingNode, ELECTION_TIMER, LEADER_DOWN_TIMER, PING_TIMER};

impl RingNode {
    /// Start the ping loop unless one is already running. Several code
    /// paths independently decide that the ping loop should be active, so the
    /// start has to be idempotent.
    pub(crate) fn arm_ping_timer_if_absent(&self) {
        let node = self.clone();
        self.timers.arm_if_absent(PING_TIMER, self.intervals.ping, async move {
            node.ping_tick().await
        });
    }

    fn arm_ping_timer(&self) {
        let node = self.clone();
        self.timers.arm(
            PING_TIMER,
            self.intervals.ping,
            async move { node.ping_tick().await },
            true,
        );
    }

    pub(crate) async fn ping_tick(&self) {
        match self.send_to_right(&Message::ping(self.id)).await {
            Ok(reply) => {
                let mut state = self.state.lock().await;
                state.right_neighbour_id = Some(reply.node_id);
                drop(state);
                self.arm_ping_timer();
            }
            Err(error) => {
                tracing::warn!(
                    "right neighbour stopped responding ({}), starting ring repair",
                    error
                );
                self.timers.cancel(PING_TIMER);
                self.recover_right_neighbour().await;
            }
        }
    }

    /// Skip dead neighbours until a reachable one answers a ping. If the
    /// ring is exhausted this node is the only one left: it declares
    /// itself leader of the singleton ring and colors itself GREEN without
    /// sending anything.
    pub(crate) async fn recover_right_neighbour(&self) {
        let failed_was_leader = {
            let state = self.state.lock().await;
            state.right_neighbour_id.is_some() && state.right_neighbour_id == state.leader_id
        };

        loop {
            let candidate = {
                let mut state = self.state.lock().await;
                if !state.topology.advance_right_neighbour() {
                    state.leader_id = Some(self.id);
                    state.color = Some(Color::Green);
                    state.leader_down = false;
                    state.round_trip_made = true;
                    state.right_neighbour_id = None;
                    // a still-armed election timer would keep hammering the
                    // dead neighbour; a singleton ring sends nothing at all
                    self.timers.cancel(ELECTION_TIMER);
                    tracing::warn!(
                        "no other ring candidate left, declaring self leader of a singleton ring"
                    );
                    return;
                }
                state.topology.right_neighbour()
            };

            tracing::info!("trying next ring candidate {}", candidate);
            match self.channel.send(&candidate, &Message::ping(self.id)).await {
                Ok(reply) => {
                    let mut state = self.state.lock().await;
                    state.right_neighbour_id = Some(reply.node_id);
                    drop(state);
                    self.arm_ping_timer();
                    break;
                }
                Err(error) => {
                    tracing::warn!("candidate {} unreachable: {}", candidate, error);
                }
            }
        }

        if failed_was_leader {
            {
                let mut state = self.state.lock().await;
                state.leader_id = None;
                state.round_trip_made = false;
            }
            tracing::warn!("failed neighbour was the leader, starting leader-down cycle");
            self.leader_down_tick().await;
        } else {
            let leader_is_self = {
                let state = self.state.lock().await;
                state.leader_id == Some(self.id)
            };
            if leader_is_self {
                tracing::info!("peer failure observed by the leader, re-running coloring");
                self.start_collection().await;
            } else if let Err(error) = self.send_to_right(&Message::node_down(self.id)).await {
                tracing::warn!("could not report node failure toward the leader: {}", error);
            }
        }
    }

    fn arm_leader_down_timer(&self) {
        let node = self.clone();
        self.timers.arm(
            LEADER_DOWN_TIMER,
            self.intervals.leader_down_retry,
            async move { node.leader_down_tick().await },
            true,
        );
    }

    /// Leader-down retry loop: keep pushing the notification into the ring
    /// until a fresh election has produced a new leader.
    pub(crate) async fn leader_down_tick(&self) {
        let leader_known = {
            let state = self.state.lock().await;
            state.leader_id.is_some()
        };
        if leader_known {
            return;
        }

        // the circuit can return to handle_leader_down while the send below
        // is still in flight, so the retry timer must already be registered
        self.arm_leader_down_timer();

        if let Err(error) = self.send_to_right(&Message::leader_down(self.id)).await {
            tracing::warn!("could not send leader-down notification: {}", error);
        }
    }

    pub(crate) async fn handle_leader_down(&self, origin_id: u64) -> Ack {
        if origin_id != self.id {
            {
                let mut state = self.state.lock().await;
                state.leader_id = None;
                state.leader_down = true;
                state.round_trip_made = false;
            }
            tracing::info!(origin_id, "leader reported down, invalidating cached leader");
            self.forward(Message::leader_down(origin_id)).await;
        } else {
            // our own notification completed the circuit; only the first
            // circuit (the one whose retry timer is still registered) may
            // start the election
            let existed = self.timers.cancel(LEADER_DOWN_TIMER);
            if existed {
                tracing::info!(
                    "leader-down notification completed the circuit, starting a fresh election"
                );
                self.arm_election_timer(true);
            } else {
                tracing::debug!("ignoring spurious leader-down circuit");
            }
        }
        self.accepted()
    }

    pub(crate) async fn handle_node_down(&self, origin_id: u64) -> Ack {
        let leader_is_self = {
            let state = self.state.lock().await;
            state.leader_id == Some(self.id)
        };
        if leader_is_self {
            tracing::info!(origin_id, "peer reported down, re-running coloring");
            self.start_collection().await;
        } else {
            self.forward(Message::node_down(origin_id)).await;
        }
        self.accepted()
    }
}
