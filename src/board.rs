//! Board: one parent's items with optimistic edits reconciled against
//! the authoritative store.

use crate::backend::Backend;
use crate::collection::{apply_operation, CollectionOp, OrderedCollection};
use crate::config::ClientConfig;
use crate::error::{Result, SyncError};
use crate::feed::ChangeEvent;
use crate::metrics::MetricsCollector;
use crate::rank::{append_rank, rank_for_move, MoveTarget};
use crate::types::{ItemDraft, ItemId, ItemPatch, OrderedItem};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifier of an in-flight optimistic mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub u64);

/// What an optimistic mutation does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Move,
    Delete,
}

impl MutationKind {
    fn operation(self) -> &'static str {
        match self {
            MutationKind::Create => "create_item",
            MutationKind::Update | MutationKind::Move => "update_item",
            MutationKind::Delete => "delete_item",
        }
    }
}

/// An optimistic edit awaiting confirmation.
#[derive(Clone, Debug)]
pub struct PendingMutation {
    pub id: MutationId,
    /// Entry the edit targets (the temporary id for creates).
    pub item_id: ItemId,
    pub kind: MutationKind,
    /// Collection as it was before the edit.
    snapshot: OrderedCollection,
}

impl PendingMutation {
    /// Collection captured before the edit.
    pub fn snapshot(&self) -> &OrderedCollection {
        &self.snapshot
    }
}

/// Result of merging one change-feed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The re-fetched row was merged by id.
    Merged(ItemId),
    /// The id was removed (or was never present).
    Removed(ItemId),
    /// The re-fetch found no row; nothing changed.
    Missing(ItemId),
    /// The re-fetch failed; the event was dropped.
    Dropped(ItemId),
}

/// Client-side state for one parent (project board).
pub struct Board<B: Backend> {
    parent_id: String,
    backend: B,
    temp_id_prefix: String,
    items: RwLock<OrderedCollection>,
    pending: Mutex<HashMap<MutationId, PendingMutation>>,
    next_mutation: AtomicU64,
    next_temp: AtomicU64,
    metrics: Arc<MetricsCollector>,
}

impl<B: Backend> Board<B> {
    /// Create an empty board with the default client config.
    pub fn new(parent_id: impl Into<String>, backend: B, metrics: Arc<MetricsCollector>) -> Self {
        Self::with_config(parent_id, backend, metrics, &ClientConfig::default())
    }

    /// Create an empty board using `config`'s temporary id prefix.
    pub fn with_config(
        parent_id: impl Into<String>,
        backend: B,
        metrics: Arc<MetricsCollector>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            parent_id: parent_id.into(),
            backend,
            temp_id_prefix: config.temp_id_prefix.clone(),
            items: RwLock::new(OrderedCollection::new()),
            pending: Mutex::new(HashMap::new()),
            next_mutation: AtomicU64::new(1),
            next_temp: AtomicU64::new(1),
            metrics,
        }
    }

    /// Parent (project) this board shows.
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    /// The authoritative store.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shared metrics collector.
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    // --- Reads ---

    /// Current collection value.
    pub fn snapshot(&self) -> OrderedCollection {
        self.items.read().clone()
    }

    /// Items in arrival order.
    pub fn items(&self) -> Vec<OrderedItem> {
        self.items.read().iter().cloned().collect()
    }

    /// Look up an item by id.
    pub fn get(&self, id: &ItemId) -> Option<OrderedItem> {
        self.items.read().get(id).cloned()
    }

    /// Items of one lane, sorted by rank.
    pub fn lane(&self, status_group: &str) -> Vec<OrderedItem> {
        self.items.read().lane(status_group)
    }

    /// All lanes, each sorted by rank.
    pub fn lanes(&self) -> BTreeMap<String, Vec<OrderedItem>> {
        self.items.read().lanes()
    }

    /// Number of in-flight mutations.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// In-flight mutations targeting `id`, oldest first.
    pub fn pending_for(&self, id: &ItemId) -> Vec<PendingMutation> {
        let mut found: Vec<PendingMutation> = self
            .pending
            .lock()
            .values()
            .filter(|p| &p.item_id == id)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.id);
        found
    }

    // --- Imperative fetch ---

    /// Replace the collection with the store's current rows.
    pub fn load(&self) -> Result<usize> {
        let rows = self
            .metrics
            .time("list_items", || self.backend.list_items(&self.parent_id))?;
        let collection = OrderedCollection::from_items(rows);
        let count = collection.len();
        *self.items.write() = collection;
        info!(parent = %self.parent_id, count, "board loaded");
        Ok(count)
    }

    // --- Optimistic primitives ---

    /// Snapshot the collection, apply `op` locally and record the edit as
    /// pending.
    pub fn begin(&self, kind: MutationKind, op: CollectionOp) -> MutationId {
        let item_id = op.target().clone();
        let mut items = self.items.write();
        self.record_pending(&mut items, kind, item_id, op)
    }

    /// Settle a pending edit with the store's answer. The entry the edit
    /// targeted is replaced by `confirmed` when there is one.
    ///
    /// Returns false if the mutation was not pending.
    pub fn confirm(&self, mutation: MutationId, confirmed: Option<OrderedItem>) -> bool {
        let Some(pending) = self.pending.lock().remove(&mutation) else {
            return false;
        };

        if let Some(item) = confirmed {
            let mut items = self.items.write();
            let next = apply_operation(
                &items,
                CollectionOp::Replace {
                    id: pending.item_id.clone(),
                    item,
                },
            );
            *items = next;
        }

        self.metrics.record_confirmed();
        debug!(mutation = mutation.0, item = %pending.item_id, kind = ?pending.kind, "confirmed");
        true
    }

    /// Restore the collection captured when `mutation` began.
    ///
    /// Returns false if the mutation was not pending.
    pub fn rollback(&self, mutation: MutationId) -> bool {
        let Some(pending) = self.pending.lock().remove(&mutation) else {
            return false;
        };

        *self.items.write() = pending.snapshot;
        self.metrics.record_rollback();
        warn!(mutation = mutation.0, item = %pending.item_id, kind = ?pending.kind, "rolled back");
        true
    }

    // --- Reconciled operations ---

    /// Create an item. It shows up at once under a temporary id and is
    /// swapped for the stored row when the store answers.
    pub fn create(&self, draft: ItemDraft) -> Result<OrderedItem> {
        let temp_id = self.mint_temp_id();
        let (mutation, request) = self.stage(MutationKind::Create, temp_id.clone(), |items| {
            let order = draft
                .order
                .clone()
                .unwrap_or_else(|| append_rank(items, &draft.status_group));
            let request = ItemDraft {
                order: Some(order.clone()),
                ..draft
            };
            let item = request.clone().into_item(temp_id.clone(), order);
            Ok((CollectionOp::Add { item }, request))
        })?;

        self.reconcile(mutation, MutationKind::Create, |backend| {
            backend.create_item(&self.parent_id, &request)
        })
    }

    /// Patch an item.
    pub fn update(&self, id: &ItemId, patch: ItemPatch) -> Result<OrderedItem> {
        let (mutation, patch) = self.stage(MutationKind::Update, id.clone(), |items| {
            if !items.contains(id) {
                return Err(SyncError::ItemNotFound(id.clone()));
            }
            Ok((
                CollectionOp::Update {
                    id: id.clone(),
                    patch: patch.clone(),
                },
                patch,
            ))
        })?;

        self.reconcile(mutation, MutationKind::Update, |backend| {
            backend.update_item(id, &patch)
        })
    }

    /// Move an item to another lane or position.
    pub fn move_item(&self, id: &ItemId, target: MoveTarget) -> Result<OrderedItem> {
        let (mutation, patch) = self.stage(MutationKind::Move, id.clone(), |items| {
            if !items.contains(id) {
                return Err(SyncError::ItemNotFound(id.clone()));
            }
            let rank = rank_for_move(items, id, &target);
            let patch = ItemPatch::new()
                .status_group(target.lane.clone())
                .order(rank);
            Ok((
                CollectionOp::Update {
                    id: id.clone(),
                    patch: patch.clone(),
                },
                patch,
            ))
        })?;

        self.reconcile(mutation, MutationKind::Move, |backend| {
            backend.update_item(id, &patch)
        })
    }

    /// Delete an item. It disappears at once and comes back only if the
    /// store refuses.
    pub fn delete(&self, id: &ItemId) -> Result<()> {
        let (mutation, ()) = self.stage(MutationKind::Delete, id.clone(), |items| {
            if !items.contains(id) {
                return Err(SyncError::ItemNotFound(id.clone()));
            }
            Ok((CollectionOp::Remove { id: id.clone() }, ()))
        })?;

        let result = self
            .metrics
            .time("delete_item", || self.backend.delete_item(id));
        match result {
            Ok(()) => {
                self.confirm(mutation, None);
                Ok(())
            }
            Err(e) => {
                self.rollback(mutation);
                Err(e)
            }
        }
    }

    // --- Change feed ---

    /// Merge one change-feed event.
    ///
    /// Inserts and updates re-fetch the full row; a failed re-fetch drops
    /// the event. Deletes remove by id whether or not the id is present.
    pub fn apply_change(&self, change: &ChangeEvent) -> ChangeOutcome {
        self.metrics.record_feed_event();
        let id = change.item_id().clone();

        match change {
            ChangeEvent::Delete { .. } => {
                let mut items = self.items.write();
                let next = apply_operation(&items, CollectionOp::Remove { id: id.clone() });
                *items = next;
                self.metrics.record_feed_remove();
                debug!(item = %id, "feed delete applied");
                ChangeOutcome::Removed(id)
            }
            ChangeEvent::Insert { .. } | ChangeEvent::Update { .. } => {
                let fetched = self
                    .metrics
                    .time("fetch_item", || self.backend.fetch_item(&id));
                match fetched {
                    Ok(Some(item)) => {
                        let mut items = self.items.write();
                        let next = apply_operation(&items, CollectionOp::Upsert { item });
                        *items = next;
                        self.metrics.record_feed_merge();
                        debug!(item = %id, kind = ?change.kind(), "feed change merged");
                        ChangeOutcome::Merged(id)
                    }
                    Ok(None) => {
                        debug!(item = %id, "feed change for missing row ignored");
                        ChangeOutcome::Missing(id)
                    }
                    Err(e) => {
                        self.metrics.record_refetch_dropped();
                        warn!(item = %id, error = %e, "re-fetch failed, dropping feed change");
                        ChangeOutcome::Dropped(id)
                    }
                }
            }
        }
    }

    // --- Internals ---

    fn mint_temp_id(&self) -> ItemId {
        let n = self.next_temp.fetch_add(1, Ordering::SeqCst);
        ItemId(format!("{}{}", self.temp_id_prefix, n))
    }

    /// Build an operation from the current collection, apply it and record
    /// the pending edit, all under one write lock.
    fn stage<T>(
        &self,
        kind: MutationKind,
        item_id: ItemId,
        build: impl FnOnce(&OrderedCollection) -> Result<(CollectionOp, T)>,
    ) -> Result<(MutationId, T)> {
        let mut items = self.items.write();
        let (op, extra) = build(&items)?;
        let id = self.record_pending(&mut items, kind, item_id, op);
        Ok((id, extra))
    }

    fn record_pending(
        &self,
        items: &mut OrderedCollection,
        kind: MutationKind,
        item_id: ItemId,
        op: CollectionOp,
    ) -> MutationId {
        let snapshot = items.clone();
        *items = apply_operation(&snapshot, op);

        let id = MutationId(self.next_mutation.fetch_add(1, Ordering::SeqCst));
        debug!(mutation = id.0, item = %item_id, ?kind, "applied optimistically");
        self.pending.lock().insert(
            id,
            PendingMutation {
                id,
                item_id,
                kind,
                snapshot,
            },
        );
        self.metrics.record_optimistic();
        id
    }

    /// Issue the authoritative request for a staged edit, then confirm or
    /// roll back.
    fn reconcile(
        &self,
        mutation: MutationId,
        kind: MutationKind,
        request: impl FnOnce(&B) -> Result<OrderedItem>,
    ) -> Result<OrderedItem> {
        let result = self
            .metrics
            .time(kind.operation(), || request(&self.backend));
        match result {
            Ok(item) => {
                self.confirm(mutation, Some(item.clone()));
                Ok(item)
            }
            Err(e) => {
                self.rollback(mutation);
                Err(e)
            }
        }
    }
}
