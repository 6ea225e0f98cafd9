//! # Taskboard
//!
//! Client-side state for a kanban-style issue tracker backed by a hosted
//! database.
//!
//! ## Core Concepts
//!
//! - **Collection**: the client's ordered view of a board's items
//! - **Board**: optimistic edits reconciled against the authoritative store
//! - **Change feed**: row-level notifications merged into the board
//! - **Rank**: string sort key within a lane
//!
//! ## Example
//!
//! ```ignore
//! use taskboard::{Board, ItemDraft, MemoryBackend, MetricsCollector, MoveTarget};
//!
//! let board = Board::new("project-1", MemoryBackend::new(), Arc::new(MetricsCollector::new()));
//! board.load()?;
//!
//! // Shows up immediately, confirmed by the store afterwards
//! let issue = board.create(ItemDraft::new("todo").with_field("title", json!("Fix login")))?;
//!
//! // Drag to the end of another column
//! board.move_item(&issue.id, MoveTarget::end_of("in_progress"))?;
//! ```

pub mod backend;
pub mod board;
pub mod collection;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod rank;
pub mod teams;
pub mod types;

// Re-exports
pub use backend::{Backend, MemoryBackend, ISSUES_TABLE};
pub use board::{Board, ChangeOutcome, MutationId, MutationKind, PendingMutation};
pub use collection::{apply_operation, CollectionOp, OrderedCollection};
pub use config::ClientConfig;
pub use error::{Result, SyncError};
pub use feed::{
    ChangeEvent, ChangeFeedListener, ChangeKind, ChannelConfig, ChannelFilter, ChannelHandle,
    ChannelId, DropReason, FeedEvent, FeedHub, RowChange, SubscriptionState,
};
pub use metrics::{MetricsCollector, MetricsSnapshot, OpTiming};
pub use rank::{append_rank, rank_for_move, MoveTarget};
pub use teams::{create_team, NewTeam, Team, TeamBackend, TeamInput};
pub use types::*;
