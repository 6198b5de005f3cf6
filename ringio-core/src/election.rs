//! Leader election: a Chang-Roberts circulation where the highest id among
//! reachable nodes wins. Lower-origin messages are dropped, higher-origin
//! messages forwarded, and a message returning to its origin makes that
//! node the leader.

use crate::message::{Ack, Message};
use crate::node::{RingNode, ELECTION_TIMER};
use std::time::Duration;

enum ElectionAction {
    /// A leader is already known; answer with the stale status and stop
    /// the message from circulating further.
    Stale,
    /// Our own round completed the circuit: announce leadership.
    Won,
    /// We outrank the message's origin; swallow it.
    Block,
    /// We outrank the origin but know the leader is down, so keep the
    /// election alive with our own round instead of stalling it.
    Reinject,
    Forward,
}

impl RingNode {
    pub(crate) fn arm_election_timer(&self, overwrite: bool) {
        let node = self.clone();
        self.timers.arm(
            ELECTION_TIMER,
            self.intervals.election_retry,
            async move { node.election_tick().await },
            overwrite,
        );
    }

    /// Self-originated election round. Keeps re-arming until our own message
    /// has made it around the ring; consecutive send failures accumulate
    /// toward the neighbour give-up ceiling, after which the neighbour is
    /// skipped and the rounds continue against the next candidate.
    pub(crate) async fn election_tick(&self) {
        tracing::debug!("sending election round to the right neighbour");
        match self.send_to_right(&Message::election_round(self.id)).await {
            Ok(reply) => {
                // the neighbour is alive, so the ping loop can start
                self.arm_ping_timer_if_absent();
                let mut state = self.state.lock().await;
                state.right_neighbour_id = Some(reply.node_id);
                state.election_wait = Duration::ZERO;
                let rearm = !state.round_trip_made;
                drop(state);
                if rearm {
                    self.arm_election_timer(true);
                }
            }
            Err(error) => {
                tracing::warn!(
                    "election send failed ({}), retrying in {:?}",
                    error,
                    self.intervals.election_retry
                );
                let mut state = self.state.lock().await;
                state.election_wait += self.intervals.election_retry;
                if state.election_wait >= self.intervals.neighbour_give_up {
                    state.election_wait = Duration::ZERO;
                    if state.topology.advance_right_neighbour() {
                        state.right_neighbour_id = None;
                        tracing::warn!(
                            "right neighbour presumed dead, advancing to {}",
                            state.topology.right_neighbour()
                        );
                    }
                }
                drop(state);
                self.arm_election_timer(true);
            }
        }
    }

    pub(crate) async fn handle_election_round(&self, origin_id: u64) -> Ack {
        let action = {
            let mut state = self.state.lock().await;
            if state.leader_id.is_some() {
                ElectionAction::Stale
            } else if origin_id == self.id {
                state.round_trip_made = true;
                state.announcement_pending = true;
                state.leader_id = Some(self.id);
                ElectionAction::Won
            } else if origin_id < self.id {
                if state.leader_down {
                    ElectionAction::Reinject
                } else {
                    ElectionAction::Block
                }
            } else {
                ElectionAction::Forward
            }
        };

        match action {
            ElectionAction::Stale => return self.election_stale(),
            ElectionAction::Won => {
                self.timers.cancel(ELECTION_TIMER);
                tracing::info!("own election round returned to origin, announcing leadership");
                if let Err(error) = self.send_to_right(&Message::leader_elected(self.id)).await {
                    tracing::warn!("could not announce leadership: {}", error);
                }
            }
            ElectionAction::Block => {
                tracing::debug!(origin_id, "blocking election message with lower origin id");
            }
            ElectionAction::Reinject => {
                tracing::info!(
                    origin_id,
                    "leader is down, re-injecting own election round instead of blocking"
                );
                if let Err(error) = self.send_to_right(&Message::election_round(self.id)).await {
                    tracing::warn!("could not re-inject election round: {}", error);
                }
            }
            ElectionAction::Forward => {
                self.forward(Message::election_round(origin_id)).await;
            }
        }
        self.accepted()
    }

    pub(crate) async fn handle_leader_elected(&self, origin_id: u64) -> Ack {
        self.timers.cancel(ELECTION_TIMER);

        enum Announcement {
            CircuitComplete,
            NewLeader,
            Duplicate,
        }

        let outcome = {
            let mut state = self.state.lock().await;
            if origin_id == self.id {
                if state.announcement_pending {
                    state.announcement_pending = false;
                    state.round_trip_made = true;
                    state.leader_down = false;
                    Announcement::CircuitComplete
                } else {
                    Announcement::Duplicate
                }
            } else if state.leader_id == Some(origin_id) {
                Announcement::Duplicate
            } else {
                state.round_trip_made = true;
                state.leader_down = false;
                state.leader_id = Some(origin_id);
                Announcement::NewLeader
            }
        };

        match outcome {
            Announcement::CircuitComplete => {
                self.arm_ping_timer_if_absent();
                tracing::info!("leader announcement completed the circuit, collecting ids");
                self.start_collection().await;
            }
            Announcement::NewLeader => {
                self.arm_ping_timer_if_absent();
                tracing::info!(leader_id = origin_id, "leader elected");
                self.forward(Message::leader_elected(origin_id)).await;
            }
            Announcement::Duplicate => {
                tracing::debug!(origin_id, "ignoring re-delivered leader announcement");
            }
        }
        self.accepted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AckStatus;
    use crate::node::PING_TIMER;
    use crate::testing::ring_node;

    #[tokio::test]
    async fn test_own_round_returning_wins_election() {
        let (node, channel) = ring_node(10, 3, 0);

        let ack = node.handle(Message::election_round(10)).await;
        assert_eq!(ack.status, AckStatus::Accepted);

        let state = node.state.lock().await;
        assert_eq!(state.leader_id, Some(10));
        assert!(state.round_trip_made);
        drop(state);

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Message::leader_elected(10));
    }

    #[tokio::test]
    async fn test_election_message_is_stale_once_leader_known() {
        let (node, channel) = ring_node(10, 3, 0);
        node.state.lock().await.leader_id = Some(42);

        let ack = node.handle(Message::election_round(5)).await;
        assert_eq!(ack.status, AckStatus::ElectionStale);
        assert!(channel.sent().is_empty());

        // even our own returning round is swallowed after convergence
        let ack = node.handle(Message::election_round(10)).await;
        assert_eq!(ack.status, AckStatus::ElectionStale);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_lower_origin_is_blocked() {
        let (node, channel) = ring_node(10, 3, 0);

        let ack = node.handle(Message::election_round(3)).await;
        assert_eq!(ack.status, AckStatus::Accepted);
        assert!(channel.sent().is_empty());
        assert_eq!(node.state.lock().await.leader_id, None);
    }

    #[tokio::test]
    async fn test_lower_origin_reinjects_own_round_while_leader_down() {
        let (node, channel) = ring_node(10, 3, 0);
        node.state.lock().await.leader_down = true;

        node.handle(Message::election_round(3)).await;

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Message::election_round(10));
    }

    #[tokio::test]
    async fn test_higher_origin_is_forwarded_with_rewritten_sender() {
        let (node, channel) = ring_node(10, 3, 0);

        node.handle(Message::election_round(99)).await;

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.origin_id(), 99);
        assert_eq!(sent[0].1.sender_id(), 10);
    }

    #[tokio::test]
    async fn test_leader_announcement_is_registered_and_forwarded() {
        let (node, channel) = ring_node(10, 3, 0);

        node.handle(Message::leader_elected(99)).await;

        let state = node.state.lock().await;
        assert_eq!(state.leader_id, Some(99));
        assert!(state.round_trip_made);
        assert!(!state.leader_down);
        drop(state);

        assert!(node.timers.exists(PING_TIMER));
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.origin_id(), 99);
        assert_eq!(sent[0].1.sender_id(), 10);
    }

    #[tokio::test]
    async fn test_announcement_circuit_starts_collection_exactly_once() {
        let (node, channel) = ring_node(10, 3, 0);

        // our round returns, we announce...
        node.handle(Message::election_round(10)).await;
        // ...and the announcement makes it back around
        node.handle(Message::leader_elected(10)).await;

        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1, Message::collect_ids(10));

        // a re-delivered announcement must not restart the collection
        node.handle(Message::leader_elected(10)).await;
        assert_eq!(channel.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_foreign_announcement_is_not_reforwarded() {
        let (node, channel) = ring_node(10, 3, 0);

        node.handle(Message::leader_elected(99)).await;
        assert_eq!(channel.sent().len(), 1);

        node.handle(Message::leader_elected(99)).await;
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_election_send_failure_past_ceiling_skips_neighbour() {
        let (node, channel) = ring_node(10, 3, 0);
        channel.push_failure("connection refused");

        // one failed send short of the ceiling: neighbour unchanged
        node.state.lock().await.election_wait =
            node.intervals.neighbour_give_up - node.intervals.election_retry * 2;
        node.election_tick().await;
        assert_eq!(
            node.state.lock().await.topology.right_neighbour().port,
            5001
        );

        channel.push_failure("connection refused");
        node.election_tick().await;
        let state = node.state.lock().await;
        assert_eq!(state.topology.right_neighbour().port, 5002);
        assert_eq!(state.election_wait, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_election_send_success_records_neighbour_and_starts_ping_loop() {
        let (node, channel) = ring_node(10, 3, 0);
        channel.push_ack(7);

        node.election_tick().await;

        let state = node.state.lock().await;
        assert_eq!(state.right_neighbour_id, Some(7));
        drop(state);
        assert!(node.timers.exists(PING_TIMER));
        // round trip not made yet, so the election timer keeps going
        assert!(node.timers.exists(ELECTION_TIMER));
    }
}
