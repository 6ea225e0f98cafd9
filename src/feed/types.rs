//! Change feed types.

use crate::config::DEFAULT_FEED_BUFFER_SIZE;
use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Partial row delivered by the push channel.
///
/// Only the changed columns are present, so consumers re-fetch the full
/// record before merging inserts and updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub id: ItemId,

    /// Parent (project) the row belongs to, when the feed carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub columns: Map<String, Value>,
}

impl RowChange {
    /// Change for row `id` with no columns.
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            columns: Map::new(),
        }
    }

    /// Set the parent id.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Add a changed column.
    pub fn with_column(mut self, key: impl Into<String>, value: Value) -> Self {
        self.columns.insert(key.into(), value);
        self
    }
}

/// Row-level change notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    Insert {
        new: RowChange,
    },
    Update {
        new: RowChange,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old: Option<RowChange>,
    },
    Delete {
        old: RowChange,
    },
}

impl ChangeEvent {
    /// Insert, update or delete.
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// The row the event is about.
    pub fn row(&self) -> &RowChange {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } => new,
            ChangeEvent::Delete { old } => old,
        }
    }

    /// Id of the changed row.
    pub fn item_id(&self) -> &ItemId {
        &self.row().id
    }
}

/// Kind of row change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which changes a channel receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelFilter {
    /// Table name (e.g. "issues").
    pub table: String,

    /// Only rows of this parent (None = all parents).
    pub parent_id: Option<String>,

    /// Event kinds to deliver (empty = all kinds).
    pub events: Vec<ChangeKind>,
}

impl ChannelFilter {
    /// Every change to `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            parent_id: None,
            events: Vec::new(),
        }
    }

    /// Every change to `table` rows under `parent_id`.
    pub fn for_parent(table: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            parent_id: Some(parent_id.into()),
            events: Vec::new(),
        }
    }

    /// Restrict to the given change kinds.
    pub fn only(mut self, events: Vec<ChangeKind>) -> Self {
        self.events = events;
        self
    }

    /// Whether a change on `table` passes the filter.
    pub fn matches(&self, table: &str, change: &ChangeEvent) -> bool {
        if self.table != table {
            return false;
        }

        if !self.events.is_empty() && !self.events.contains(&change.kind()) {
            return false;
        }

        match (&self.parent_id, &change.row().parent_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            // Deletes often carry only the primary key; let them through.
            (Some(_), None) => change.kind() == ChangeKind::Delete,
            (None, _) => true,
        }
    }
}

/// Configuration for a feed channel.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Channel name, for logs.
    pub name: String,

    /// Max buffered events before dropping the subscriber.
    /// Default: 256
    pub buffer_size: usize,

    pub filter: ChannelFilter,
}

impl ChannelConfig {
    /// Channel with the default buffer size.
    pub fn new(name: impl Into<String>, filter: ChannelFilter) -> Self {
        Self {
            name: name.into(),
            buffer_size: DEFAULT_FEED_BUFFER_SIZE,
            filter,
        }
    }

    /// Override the buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

/// Messages delivered on a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// The channel is live.
    Subscribed,

    /// A row changed.
    Change { table: String, change: ChangeEvent },

    /// The channel was torn down.
    Dropped { reason: DropReason },
}

/// Why a channel was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The hub shut down.
    Closed,
}

/// Unique identifier for a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

/// Receiving end of a channel.
pub struct ChannelHandle {
    pub id: ChannelId,
    pub receiver: crossbeam_channel::Receiver<FeedEvent>,
}

impl ChannelHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<FeedEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<FeedEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<FeedEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Lifecycle of a listener's subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

impl SubscriptionState {
    /// Lowercase state name.
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionState::Unsubscribed => "unsubscribed",
            SubscriptionState::Subscribing => "subscribing",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Unsubscribing => "unsubscribing",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_event_tagging() {
        let change = ChangeEvent::Update {
            new: RowChange::new("7").with_parent("p1").with_column("title", json!("t")),
            old: None,
        };
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(
            value,
            json!({"event": "update", "new": {"id": "7", "parent_id": "p1", "columns": {"title": "t"}}})
        );

        let back: ChangeEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, change);
        assert_eq!(back.kind(), ChangeKind::Update);
    }

    #[test]
    fn test_filter_by_parent_and_kind() {
        let filter = ChannelFilter::for_parent("issues", "p1");
        let insert_p1 = ChangeEvent::Insert { new: RowChange::new("1").with_parent("p1") };
        let insert_p2 = ChangeEvent::Insert { new: RowChange::new("2").with_parent("p2") };
        let bare_delete = ChangeEvent::Delete { old: RowChange::new("3") };

        assert!(filter.matches("issues", &insert_p1));
        assert!(!filter.matches("issues", &insert_p2));
        assert!(!filter.matches("comments", &insert_p1));
        assert!(filter.matches("issues", &bare_delete));

        let deletes_only = ChannelFilter::table("issues").only(vec![ChangeKind::Delete]);
        assert!(!deletes_only.matches("issues", &insert_p1));
        assert!(deletes_only.matches("issues", &bare_delete));
    }
}
