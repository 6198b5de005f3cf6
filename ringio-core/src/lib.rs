//! Ringio Core - ring membership, leader election and partition coloring

pub mod channel;
pub mod coloring;
pub mod election;
pub mod error;
pub mod message;
pub mod node;
pub mod recovery;
pub mod state;
pub mod timer;
pub mod topology;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{HttpPeerChannel, PeerChannel};
pub use coloring::determine_coloring;
pub use error::{Result, RingError};
pub use message::{Ack, AckStatus, Color, Message};
pub use node::{RingIntervals, RingNode, RingSnapshot, ELECTION_TIMER, LEADER_DOWN_TIMER, PING_TIMER};
pub use state::NodeState;
pub use timer::TimerRegistry;
pub use topology::{NeighbourScheme, PeerAddr, RingTopology};
