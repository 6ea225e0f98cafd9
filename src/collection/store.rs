//! Ordered collection value.

use crate::types::{ItemId, ItemPatch, OrderedItem, Rank};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable-by-convention list of items in arrival order.
///
/// Ids are unique; lane order is derived from ranks on demand. Serialized
/// as a plain array; deserializing goes through [`from_items`](Self::from_items)
/// so duplicate ids collapse.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<OrderedItem>", into = "Vec<OrderedItem>")]
pub struct OrderedCollection {
    items: Vec<OrderedItem>,
}

impl OrderedCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from fetched rows. Later duplicates win.
    pub fn from_items(items: impl IntoIterator<Item = OrderedItem>) -> Self {
        items
            .into_iter()
            .fold(Self::new(), |collection, item| collection.add(item))
    }

    /// Add an item. An existing entry with the same id is replaced in place.
    pub fn add(&self, item: OrderedItem) -> Self {
        let mut items = self.items.clone();
        match items.iter().position(|existing| existing.id == item.id) {
            Some(pos) => items[pos] = item,
            None => items.push(item),
        }
        Self { items }
    }

    /// Patch an item. Missing ids are a no-op.
    pub fn update(&self, id: &ItemId, patch: &ItemPatch) -> Self {
        let items = self
            .items
            .iter()
            .map(|item| {
                if &item.id == id {
                    item.patched(patch)
                } else {
                    item.clone()
                }
            })
            .collect();
        Self { items }
    }

    /// Remove an item. Missing ids are a no-op.
    pub fn remove(&self, id: &ItemId) -> Self {
        let items = self
            .items
            .iter()
            .filter(|item| &item.id != id)
            .cloned()
            .collect();
        Self { items }
    }

    /// Swap the entry `id` for `item`.
    ///
    /// A different entry already carrying `item.id` is dropped so the
    /// confirmed row never appears twice. When `id` is gone the entry for
    /// `item.id` is overwritten if present; otherwise nothing changes.
    pub fn replace(&self, id: &ItemId, item: OrderedItem) -> Self {
        if !self.contains(id) {
            return if self.contains(&item.id) {
                self.add(item)
            } else {
                self.clone()
            };
        }

        let new_id = item.id.clone();
        let mut slot = Some(item);
        let items = self
            .items
            .iter()
            .filter_map(|existing| {
                if &existing.id == id {
                    slot.take()
                } else if existing.id == new_id {
                    None
                } else {
                    Some(existing.clone())
                }
            })
            .collect();
        Self { items }
    }

    /// Replace by id or append.
    pub fn upsert(&self, item: OrderedItem) -> Self {
        self.add(item)
    }

    /// Look up an item by id.
    pub fn get(&self, id: &ItemId) -> Option<&OrderedItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Whether an item with `id` is present.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &OrderedItem> {
        self.items.iter()
    }

    /// Ids in arrival order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    /// Consume the collection, returning its items.
    pub fn into_items(self) -> Vec<OrderedItem> {
        self.items
    }

    /// Items of one lane, sorted by rank. Equal ranks keep arrival order.
    pub fn lane(&self, status_group: &str) -> Vec<OrderedItem> {
        let mut lane: Vec<OrderedItem> = self
            .items
            .iter()
            .filter(|item| item.status_group == status_group)
            .cloned()
            .collect();
        lane.sort_by(|a, b| a.order.cmp(&b.order));
        lane
    }

    /// All lanes keyed by name, each sorted by rank.
    pub fn lanes(&self) -> BTreeMap<String, Vec<OrderedItem>> {
        let mut lanes: BTreeMap<String, Vec<OrderedItem>> = BTreeMap::new();
        for item in &self.items {
            lanes
                .entry(item.status_group.clone())
                .or_default()
                .push(item.clone());
        }
        for lane in lanes.values_mut() {
            lane.sort_by(|a, b| a.order.cmp(&b.order));
        }
        lanes
    }

    /// Largest rank in a lane under rank ordering.
    pub fn max_rank(&self, status_group: &str) -> Option<&Rank> {
        self.items
            .iter()
            .filter(|item| item.status_group == status_group)
            .map(|item| &item.order)
            .max()
    }

    /// Rank of the item at `position` in lane order, skipping `exclude`.
    pub fn rank_at(&self, status_group: &str, position: usize, exclude: &ItemId) -> Option<Rank> {
        self.lane(status_group)
            .into_iter()
            .filter(|item| &item.id != exclude)
            .nth(position)
            .map(|item| item.order)
    }
}

impl From<Vec<OrderedItem>> for OrderedCollection {
    fn from(items: Vec<OrderedItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<OrderedCollection> for Vec<OrderedItem> {
    fn from(collection: OrderedCollection) -> Self {
        collection.items
    }
}

impl FromIterator<OrderedItem> for OrderedCollection {
    fn from_iter<I: IntoIterator<Item = OrderedItem>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}
