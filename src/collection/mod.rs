//! Client-side view of a board's items.
//!
//! Every operation returns a new collection and leaves its input alone,
//! so a copy taken before an optimistic edit is a complete rollback point.

mod operations;
mod store;

pub use operations::{apply_operation, CollectionOp};
pub use store::OrderedCollection;
