use crate::message::Color;
use crate::topology::RingTopology;
use std::time::Duration;

/// Mutable per-node protocol state. One instance lives for the whole
/// process; every mutation happens under the node's state lock.
#[derive(Debug)]
pub struct NodeState {
    /// Ring addressing, including the mutable right-neighbour pointer.
    pub topology: RingTopology,
    /// Last known id of the right neighbour, refreshed opportunistically
    /// from reply payloads.
    pub right_neighbour_id: Option<u64>,
    /// Currently known leader. `None` both before the first election and
    /// after a leader-down invalidation.
    pub leader_id: Option<u64>,
    /// True while this node believes the leader is unreachable and a fresh
    /// election is warranted.
    pub leader_down: bool,
    /// True once an election message this node originated has returned to
    /// it; gates whether the election timer keeps re-arming.
    pub round_trip_made: bool,
    /// True between announcing leadership and seeing the announcement
    /// return; distinguishes the first circuit from a re-delivered one.
    pub announcement_pending: bool,
    /// This node's partition label, assigned by a COLORING message.
    pub color: Option<Color>,
    /// Full membership in ring order, known only at the collection
    /// originator after a COLLECT_IDS round trip.
    pub collected_ids: Option<Vec<u64>>,
    /// Cumulative wait across consecutive failed election sends, compared
    /// against the neighbour give-up ceiling.
    pub election_wait: Duration,
}

impl NodeState {
    pub fn new(topology: RingTopology) -> Self {
        Self {
            topology,
            right_neighbour_id: None,
            leader_id: None,
            leader_down: false,
            round_trip_made: false,
            announcement_pending: false,
            color: None,
            collected_ids: None,
            election_wait: Duration::ZERO,
        }
    }
}
