//! Collection operation application.

use super::OrderedCollection;
use crate::types::{ItemId, ItemPatch, OrderedItem};
use serde::{Deserialize, Serialize};

/// An edit to a collection, as recorded for optimistic application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CollectionOp {
    /// Add or replace by id.
    Add { item: OrderedItem },

    /// Patch an existing item.
    Update { id: ItemId, patch: ItemPatch },

    /// Drop an item.
    Remove { id: ItemId },

    /// Swap a (possibly temporary) entry for a confirmed one.
    Replace { id: ItemId, item: OrderedItem },

    /// Merge a row delivered from elsewhere.
    Upsert { item: OrderedItem },
}

impl CollectionOp {
    /// Id of the entry the operation targets.
    pub fn target(&self) -> &ItemId {
        match self {
            CollectionOp::Add { item } | CollectionOp::Upsert { item } => &item.id,
            CollectionOp::Update { id, .. }
            | CollectionOp::Remove { id }
            | CollectionOp::Replace { id, .. } => id,
        }
    }
}

/// Apply an operation to a collection, producing the next collection.
///
/// The input is never modified.
pub fn apply_operation(collection: &OrderedCollection, op: CollectionOp) -> OrderedCollection {
    match op {
        CollectionOp::Add { item } => collection.add(item),
        CollectionOp::Update { id, patch } => collection.update(&id, &patch),
        CollectionOp::Remove { id } => collection.remove(&id),
        CollectionOp::Replace { id, item } => collection.replace(&id, item),
        CollectionOp::Upsert { item } => collection.upsert(item),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rank;

    #[test]
    fn test_sequence_of_ops() {
        let mut c = OrderedCollection::new();
        let ops = vec![
            CollectionOp::Add { item: OrderedItem::new("1", "1", "todo") },
            CollectionOp::Add { item: OrderedItem::new("2", "2", "todo") },
            CollectionOp::Update {
                id: "1".into(),
                patch: ItemPatch::new().status_group("done"),
            },
            CollectionOp::Remove { id: "2".into() },
            CollectionOp::Upsert { item: OrderedItem::new("3", "1", "todo") },
        ];

        for op in ops {
            c = apply_operation(&c, op);
        }

        assert_eq!(c.ids(), vec![ItemId::from("1"), ItemId::from("3")]);
        assert_eq!(c.get(&"1".into()).unwrap().status_group, "done");
    }

    #[test]
    fn test_apply_leaves_input_alone() {
        let before = OrderedCollection::new().add(OrderedItem::new("1", "1", "todo"));
        let snapshot = before.clone();

        let after = apply_operation(
            &before,
            CollectionOp::Update {
                id: "1".into(),
                patch: ItemPatch::new().order("8"),
            },
        );

        assert_eq!(before, snapshot);
        assert_eq!(after.get(&"1".into()).unwrap().order, Rank::from("8"));
    }

    #[test]
    fn test_target() {
        let op = CollectionOp::Replace {
            id: "temp-1".into(),
            item: OrderedItem::new("srv-1", "1", "todo"),
        };
        assert_eq!(op.target(), &ItemId::from("temp-1"));
    }

    #[test]
    fn test_op_wire_format() {
        let op = CollectionOp::Remove { id: "9".into() };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json, serde_json::json!({"op": "remove", "id": "9"}));
    }
}
