//! In-memory backend.
//!
//! Stands in for the hosted store: assigns server ids, keeps rows per
//! parent, bumps a `version` column on every write, and publishes
//! partial-row changes to an attached [`FeedHub`].

use crate::error::{Result, SyncError};
use crate::feed::{ChangeEvent, FeedHub, RowChange};
use crate::teams::{NewTeam, Team, TeamBackend};
use crate::types::{ItemDraft, ItemId, ItemPatch, OrderedItem, Rank};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::Backend;

/// Table name used for published item changes.
pub const ISSUES_TABLE: &str = "issues";

/// A stored row.
#[derive(Clone, Debug)]
struct Row {
    parent_id: String,
    item: OrderedItem,
}

/// Injected failures.
#[derive(Debug, Default)]
struct Faults {
    /// Operations that fail until healed.
    failing: HashSet<&'static str>,
    /// Number of upcoming calls (any operation) that fail.
    fail_next: usize,
}

/// In-memory authoritative store.
pub struct MemoryBackend {
    rows: RwLock<Vec<Row>>,
    teams: Mutex<Vec<Team>>,
    next_id: AtomicU64,
    id_prefix: String,
    faults: Mutex<Faults>,
    hub: Option<Arc<FeedHub>>,
}

impl MemoryBackend {
    /// Create an empty store with no hub attached.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            teams: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            id_prefix: "srv-".to_string(),
            faults: Mutex::new(Faults::default()),
            hub: None,
        }
    }

    /// Publish every write to `hub`.
    pub fn with_hub(mut self, hub: Arc<FeedHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Prefix for server-assigned ids. Default: "srv-"
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Store a row as-is, without publishing.
    pub fn seed(&self, parent_id: &str, item: OrderedItem) {
        let mut rows = self.rows.write();
        rows.retain(|row| row.item.id != item.id);
        rows.push(Row {
            parent_id: parent_id.to_string(),
            item,
        });
    }

    /// Make `operation` fail until [`heal`](Self::heal) is called.
    pub fn fail_operation(&self, operation: &'static str) {
        self.faults.lock().failing.insert(operation);
    }

    /// Stop failing `operation`.
    pub fn heal(&self, operation: &'static str) {
        self.faults.lock().failing.remove(operation);
    }

    /// Make the next `count` calls fail regardless of operation.
    pub fn fail_next(&self, count: usize) {
        self.faults.lock().fail_next = count;
    }

    /// Number of stored rows across all parents.
    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Teams created so far.
    pub fn teams(&self) -> Vec<Team> {
        self.teams.lock().clone()
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        let mut faults = self.faults.lock();
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(SyncError::backend(operation, "injected failure"));
        }
        if faults.failing.contains(operation) {
            return Err(SyncError::backend(operation, "injected failure"));
        }
        Ok(())
    }

    fn mint_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn publish(&self, change: ChangeEvent) {
        if let Some(ref hub) = self.hub {
            hub.publish(ISSUES_TABLE, &change);
        }
    }

    fn next_version(item: &OrderedItem) -> Value {
        let current = item.payload.get("version").and_then(Value::as_u64).unwrap_or(0);
        json!(current + 1)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Changed columns of a patch, as the push channel would carry them.
fn patch_columns(patch: &ItemPatch, version: &Value) -> Map<String, Value> {
    let mut columns = patch.fields.clone();
    if let Some(ref order) = patch.order {
        columns.insert("order".to_string(), json!(order.as_str()));
    }
    if let Some(ref group) = patch.status_group {
        columns.insert("status_group".to_string(), json!(group));
    }
    columns.insert("version".to_string(), version.clone());
    columns
}

impl Backend for MemoryBackend {
    fn list_items(&self, parent_id: &str) -> Result<Vec<OrderedItem>> {
        self.check("list_items")?;
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|row| row.parent_id == parent_id)
            .map(|row| row.item.clone())
            .collect())
    }

    fn fetch_item(&self, id: &ItemId) -> Result<Option<OrderedItem>> {
        self.check("fetch_item")?;
        Ok(self
            .rows
            .read()
            .iter()
            .find(|row| &row.item.id == id)
            .map(|row| row.item.clone()))
    }

    fn create_item(&self, parent_id: &str, draft: &ItemDraft) -> Result<OrderedItem> {
        self.check("create_item")?;

        let item = {
            let mut rows = self.rows.write();
            let order = draft.order.clone().unwrap_or_else(|| {
                let max = rows
                    .iter()
                    .filter(|row| {
                        row.parent_id == parent_id && row.item.status_group == draft.status_group
                    })
                    .map(|row| &row.item.order)
                    .max();
                Rank::after(max)
            });
            let id = ItemId(format!("{}{}", self.id_prefix, self.mint_id()));
            let mut item = draft.clone().into_item(id, order);
            item.payload.insert("version".to_string(), json!(1));
            rows.push(Row {
                parent_id: parent_id.to_string(),
                item: item.clone(),
            });
            item
        };

        let mut row = RowChange::new(item.id.clone()).with_parent(parent_id);
        row.columns = item.payload.clone();
        row.columns.insert("order".to_string(), json!(item.order.as_str()));
        row.columns.insert("status_group".to_string(), json!(item.status_group));
        self.publish(ChangeEvent::Insert { new: row });

        Ok(item)
    }

    fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> Result<OrderedItem> {
        self.check("update_item")?;

        let (parent_id, item, version) = {
            let mut rows = self.rows.write();
            let row = rows
                .iter_mut()
                .find(|row| &row.item.id == id)
                .ok_or_else(|| SyncError::backend("update_item", format!("no row {id}")))?;
            let version = Self::next_version(&row.item);
            row.item = row.item.patched(patch);
            row.item.payload.insert("version".to_string(), version.clone());
            (row.parent_id.clone(), row.item.clone(), version)
        };

        let mut new = RowChange::new(id.clone()).with_parent(parent_id.clone());
        new.columns = patch_columns(patch, &version);
        self.publish(ChangeEvent::Update {
            new,
            old: Some(RowChange::new(id.clone()).with_parent(parent_id)),
        });

        Ok(item)
    }

    fn delete_item(&self, id: &ItemId) -> Result<()> {
        self.check("delete_item")?;

        let removed = {
            let mut rows = self.rows.write();
            let pos = rows.iter().position(|row| &row.item.id == id);
            pos.map(|pos| rows.remove(pos))
        };

        match removed {
            Some(row) => {
                self.publish(ChangeEvent::Delete {
                    old: RowChange::new(id.clone()).with_parent(row.parent_id),
                });
                Ok(())
            }
            None => Err(SyncError::backend("delete_item", format!("no row {id}"))),
        }
    }
}

impl TeamBackend for MemoryBackend {
    fn create_team(&self, team: &NewTeam) -> Result<Team> {
        self.check("create_team")?;
        let created = Team {
            id: format!("team-{}", self.mint_id()),
            name: team.name().to_string(),
            description: team.description().map(str::to_string),
        };
        self.teams.lock().push(created.clone());
        Ok(created)
    }
}
