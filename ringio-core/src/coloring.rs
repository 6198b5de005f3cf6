//! Partition coloring: after election the leader collects every id in ring
//! order with a COLLECT_IDS circuit, labels the first third (rounded up)
//! GREEN and the rest RED, and broadcasts the result with a COLORING
//! circuit.

use crate::message::{Ack, Color, Message};
use crate::node::RingNode;
use std::collections::BTreeMap;

/// Split a membership sequence into colors. The sequence is in ring order
/// starting from the collection originator, and the first `ceil(N / 3)`
/// entries in that order are GREEN; the label is a function of ring
/// position, not of id value.
pub fn determine_coloring(ids: &[u64]) -> BTreeMap<u64, Color> {
    let green_count = ids.len().div_ceil(3);
    ids.iter()
        .enumerate()
        .map(|(position, id)| {
            let color = if position < green_count {
                Color::Green
            } else {
                Color::Red
            };
            (*id, color)
        })
        .collect()
}

impl RingNode {
    /// Begin a collection circuit, seeded with our own id. Only the leader
    /// originates collections.
    pub(crate) async fn start_collection(&self) {
        if let Err(error) = self.send_to_right(&Message::collect_ids(self.id)).await {
            tracing::warn!("could not start id collection: {}", error);
        }
    }

    pub(crate) async fn handle_collect_ids(&self, origin_id: u64, mut ids: Vec<u64>) -> Ack {
        if origin_id == self.id {
            tracing::info!("id collection completed in ring order: {:?}", ids);
            let colors = determine_coloring(&ids);
            {
                let mut state = self.state.lock().await;
                state.color = colors.get(&self.id).copied();
                state.collected_ids = Some(ids);
            }
            if let Err(error) = self
                .send_to_right(&Message::coloring(self.id, colors))
                .await
            {
                tracing::warn!("could not broadcast coloring: {}", error);
            }
        } else {
            ids.push(self.id);
            self.forward(Message::CollectIds {
                origin_id,
                sender_id: self.id,
                ids,
            })
            .await;
        }
        self.accepted()
    }

    pub(crate) async fn handle_coloring(
        &self,
        origin_id: u64,
        colors: BTreeMap<u64, Color>,
    ) -> Ack {
        if origin_id == self.id {
            tracing::info!("coloring circuit completed, all colors are set");
        } else {
            let assigned = colors.get(&self.id).copied();
            match assigned {
                Some(color) => tracing::info!(?color, "color assigned"),
                None => tracing::warn!("coloring map does not contain our id"),
            }
            {
                let mut state = self.state.lock().await;
                state.color = assigned;
            }
            self.forward(Message::Coloring {
                origin_id,
                sender_id: self.id,
                colors,
            })
            .await;
        }
        self.accepted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ring_node;

    #[test]
    fn test_green_count_is_ceil_of_a_third() {
        let colors = determine_coloring(&[7, 3, 9, 1, 5]);
        assert_eq!(colors[&7], Color::Green);
        assert_eq!(colors[&3], Color::Green);
        assert_eq!(colors[&9], Color::Red);
        assert_eq!(colors[&1], Color::Red);
        assert_eq!(colors[&5], Color::Red);
    }

    #[test]
    fn test_coloring_boundaries() {
        assert_eq!(determine_coloring(&[4])[&4], Color::Green);

        let two = determine_coloring(&[4, 2]);
        assert_eq!(two[&4], Color::Green);
        assert_eq!(two[&2], Color::Red);

        let three = determine_coloring(&[4, 2, 6]);
        assert_eq!(
            three.values().filter(|c| **c == Color::Green).count(),
            1
        );

        let four = determine_coloring(&[4, 2, 6, 8]);
        assert_eq!(four[&4], Color::Green);
        assert_eq!(four[&2], Color::Green);
        assert_eq!(four[&6], Color::Red);
        assert_eq!(four[&8], Color::Red);
    }

    #[tokio::test]
    async fn test_collection_appends_own_id_and_forwards() {
        let (node, channel) = ring_node(10, 3, 0);

        node.handle(Message::CollectIds {
            origin_id: 99,
            sender_id: 99,
            ids: vec![99, 7],
        })
        .await;

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            Message::CollectIds {
                origin_id: 99,
                sender_id: 10,
                ids: vec![99, 7, 10],
            }
        );
    }

    #[tokio::test]
    async fn test_collection_return_broadcasts_coloring() {
        let (node, channel) = ring_node(10, 3, 0);

        node.handle(Message::CollectIds {
            origin_id: 10,
            sender_id: 5,
            ids: vec![10, 3, 9, 1, 5],
        })
        .await;

        let state = node.state.lock().await;
        assert_eq!(state.collected_ids.as_deref(), Some(&[10, 3, 9, 1, 5][..]));
        // the originator is first in ring order, so always GREEN
        assert_eq!(state.color, Some(Color::Green));
        drop(state);

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0].1 {
            Message::Coloring { origin_id, colors, .. } => {
                assert_eq!(*origin_id, 10);
                assert_eq!(colors[&10], Color::Green);
                assert_eq!(colors[&3], Color::Green);
                assert_eq!(colors[&9], Color::Red);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_coloring_sets_own_color_and_forwards() {
        let (node, channel) = ring_node(10, 3, 0);
        let colors = determine_coloring(&[99, 10, 7]);

        node.handle(Message::Coloring {
            origin_id: 99,
            sender_id: 99,
            colors: colors.clone(),
        })
        .await;

        // ring order [99, 10, 7]: only the leader's slot is GREEN
        assert_eq!(node.state.lock().await.color, Some(Color::Red));

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.sender_id(), 10);
    }

    #[tokio::test]
    async fn test_coloring_circuit_ends_at_origin() {
        let (node, channel) = ring_node(10, 3, 0);
        let colors = determine_coloring(&[10, 3, 9]);

        node.handle(Message::Coloring {
            origin_id: 10,
            sender_id: 9,
            colors,
        })
        .await;

        assert!(channel.sent().is_empty());
    }
}
