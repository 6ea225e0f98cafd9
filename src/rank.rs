//! Rank assignment for moves and inserts.

use crate::collection::OrderedCollection;
use crate::types::{ItemId, Rank};
use serde::{Deserialize, Serialize};

/// Where a moved item should land.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget {
    /// Destination lane.
    pub lane: String,

    /// Index in the destination lane's rank order (the moved item itself
    /// not counted). `None` appends to the end.
    pub position: Option<usize>,
}

impl MoveTarget {
    /// Append to the end of `lane`.
    pub fn end_of(lane: impl Into<String>) -> Self {
        Self {
            lane: lane.into(),
            position: None,
        }
    }

    /// Take the place of whatever sits at `position` in `lane`.
    pub fn at(lane: impl Into<String>, position: usize) -> Self {
        Self {
            lane: lane.into(),
            position: Some(position),
        }
    }
}

/// Rank for a new entry at the end of a lane: the successor of the
/// largest rank currently in it, or `1` for an empty lane.
pub fn append_rank(collection: &OrderedCollection, lane: &str) -> Rank {
    Rank::after(collection.max_rank(lane))
}

/// Rank to request when moving `id` to `target`.
///
/// With a position, the rank of the item occupying it is reused and the
/// store's secondary ordering breaks the tie. A position past the end of
/// the lane behaves like an append.
pub fn rank_for_move(collection: &OrderedCollection, id: &ItemId, target: &MoveTarget) -> Rank {
    target
        .position
        .and_then(|position| collection.rank_at(&target.lane, position, id))
        .unwrap_or_else(|| append_rank(collection, &target.lane))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemPatch, OrderedItem};

    fn board() -> OrderedCollection {
        OrderedCollection::new()
            .add(OrderedItem::new("1", "1", "todo"))
            .add(OrderedItem::new("2", "2", "todo"))
            .add(OrderedItem::new("3", "7", "done"))
            .add(OrderedItem::new("4", "3", "done"))
    }

    #[test]
    fn test_append_to_empty_lane() {
        let c = OrderedCollection::new().add(OrderedItem::new("1", "1", "todo"));
        let rank = rank_for_move(&c, &"1".into(), &MoveTarget::end_of("done"));
        assert_eq!(rank, Rank::from("1"));
    }

    #[test]
    fn test_append_after_max() {
        let rank = rank_for_move(&board(), &"1".into(), &MoveTarget::end_of("done"));
        assert_eq!(rank, Rank::from("8"));
    }

    #[test]
    fn test_append_within_same_lane() {
        // Counting the moved item keeps the new rank strictly above it.
        let rank = rank_for_move(&board(), &"2".into(), &MoveTarget::end_of("todo"));
        assert_eq!(rank, Rank::from("3"));
    }

    #[test]
    fn test_position_reuses_occupant_rank() {
        // done lane in order: "4"(3), "3"(7)
        let rank = rank_for_move(&board(), &"1".into(), &MoveTarget::at("done", 1));
        assert_eq!(rank, Rank::from("7"));

        let rank = rank_for_move(&board(), &"1".into(), &MoveTarget::at("done", 0));
        assert_eq!(rank, Rank::from("3"));
    }

    #[test]
    fn test_position_past_end_appends() {
        let rank = rank_for_move(&board(), &"1".into(), &MoveTarget::at("done", 5));
        assert_eq!(rank, Rank::from("8"));
    }

    #[test]
    fn test_append_after_string_rank() {
        let c = OrderedCollection::new()
            .add(OrderedItem::new("a", "zz", "done"))
            .add(OrderedItem::new("b", "4", "done"))
            .add(OrderedItem::new("m", "1", "todo"));
        let rank = rank_for_move(&c, &"m".into(), &MoveTarget::end_of("done"));
        assert_eq!(rank, Rank::from("zza"));

        let patch = ItemPatch::new().order(rank).status_group("done");
        let moved = c.update(&"m".into(), &patch);
        let order: Vec<_> = moved.lane("done").into_iter().map(|i| i.id).collect();
        assert_eq!(order, vec![ItemId::from("b"), ItemId::from("a"), ItemId::from("m")]);
    }

    #[test]
    fn test_append_after_wide_integers() {
        for (existing, expected) in [
            ("99999999999999999999", "100000000000000000000"),
            ("9223372036854775807", "9223372036854775808"),
        ] {
            let c = OrderedCollection::new()
                .add(OrderedItem::new("a", existing, "done"))
                .add(OrderedItem::new("m", "1", "todo"));
            let rank = rank_for_move(&c, &"m".into(), &MoveTarget::end_of("done"));
            assert_eq!(rank, Rank::from(expected));
            assert!(rank > Rank::from(existing));
        }
    }
}
