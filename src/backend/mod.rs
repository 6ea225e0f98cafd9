//! Authoritative store seam.
//!
//! The hosted database is reached only through [`Backend`]. Calls block
//! until the platform answers; failures come back as
//! [`SyncError::Backend`](crate::SyncError::Backend).

mod memory;

pub use memory::{MemoryBackend, ISSUES_TABLE};

use crate::error::Result;
use crate::types::{ItemDraft, ItemId, ItemPatch, OrderedItem};
use std::sync::Arc;

/// Row operations on the authoritative store.
pub trait Backend: Send + Sync {
    /// All items under a parent, in the store's order.
    fn list_items(&self, parent_id: &str) -> Result<Vec<OrderedItem>>;

    /// Full (joined) record for one item. `None` if it no longer exists.
    fn fetch_item(&self, id: &ItemId) -> Result<Option<OrderedItem>>;

    /// Insert a row and return it with server-assigned id and fields.
    fn create_item(&self, parent_id: &str, draft: &ItemDraft) -> Result<OrderedItem>;

    /// Apply a patch and return the updated row.
    fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> Result<OrderedItem>;

    fn delete_item(&self, id: &ItemId) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn list_items(&self, parent_id: &str) -> Result<Vec<OrderedItem>> {
        (**self).list_items(parent_id)
    }

    fn fetch_item(&self, id: &ItemId) -> Result<Option<OrderedItem>> {
        (**self).fetch_item(id)
    }

    fn create_item(&self, parent_id: &str, draft: &ItemDraft) -> Result<OrderedItem> {
        (**self).create_item(parent_id, draft)
    }

    fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> Result<OrderedItem> {
        (**self).update_item(id, patch)
    }

    fn delete_item(&self, id: &ItemId) -> Result<()> {
        (**self).delete_item(id)
    }
}
