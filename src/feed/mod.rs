//! Row-level change feed.
//!
//! - [`FeedHub`] fans insert/update/delete notifications out to named,
//!   filtered channels with bounded buffers.
//! - [`ChangeFeedListener`] owns one channel and merges what arrives into a
//!   [`Board`](crate::Board), re-fetching full rows for inserts and updates.
//!
//! # Example
//!
//! ```ignore
//! let hub = Arc::new(FeedHub::new());
//! let mut listener = ChangeFeedListener::with_config(&board, &config);
//! listener.subscribe(&hub)?;
//!
//! loop {
//!     for outcome in listener.poll_timeout(&board, Duration::from_millis(500))? {
//!         println!("{:?}", outcome);
//!     }
//! }
//! ```

mod hub;
mod listener;
mod types;

pub use hub::FeedHub;
pub use listener::ChangeFeedListener;
pub use types::{
    ChangeEvent, ChangeKind, ChannelConfig, ChannelFilter, ChannelHandle, ChannelId, DropReason,
    FeedEvent, RowChange, SubscriptionState,
};
