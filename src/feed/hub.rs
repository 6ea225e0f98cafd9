//! In-process hub that fans row changes out to channels.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::types::{
    ChangeEvent, ChannelConfig, ChannelHandle, ChannelId, DropReason, FeedEvent,
};

/// Internal channel state.
struct Channel {
    config: ChannelConfig,
    sender: Sender<FeedEvent>,
}

impl Channel {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (channel will be dropped).
    fn try_send(&self, event: FeedEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    fn matches(&self, table: &str, change: &ChangeEvent) -> bool {
        self.config.filter.matches(table, change)
    }
}

/// Manages channels and broadcasts changes.
pub struct FeedHub {
    channels: RwLock<HashMap<ChannelId, Channel>>,
    next_id: AtomicU64,
}

impl FeedHub {
    /// Create a hub with no channels.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a channel. The first message on it is `FeedEvent::Subscribed`.
    pub fn subscribe(&self, config: ChannelConfig) -> ChannelHandle {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::SeqCst));
        // One extra slot for the acknowledgement.
        let (sender, receiver) = bounded(config.buffer_size.max(1) + 1);

        let _ = sender.try_send(FeedEvent::Subscribed);
        debug!(channel = %config.name, id = id.0, "channel subscribed");

        self.channels.write().insert(id, Channel { config, sender });

        ChannelHandle { id, receiver }
    }

    /// Close a channel. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ChannelId) {
        if let Some(channel) = self.channels.write().remove(&id) {
            debug!(channel = %channel.config.name, id = id.0, "channel unsubscribed");
            let _ = channel.sender.try_send(FeedEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Whether channel `id` is still open.
    pub fn is_subscribed(&self, id: ChannelId) -> bool {
        self.channels.read().contains_key(&id)
    }

    /// Deliver a change to every matching channel. Returns how many
    /// channels received it.
    pub fn publish(&self, table: &str, change: &ChangeEvent) -> usize {
        let mut delivered = 0;
        let mut to_remove = Vec::new();

        {
            let channels = self.channels.read();
            for (id, channel) in channels.iter() {
                if !channel.matches(table, change) {
                    continue;
                }
                let event = FeedEvent::Change {
                    table: table.to_string(),
                    change: change.clone(),
                };
                if channel.try_send(event) {
                    delivered += 1;
                } else {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut channels = self.channels.write();
            for id in to_remove {
                if let Some(channel) = channels.remove(&id) {
                    warn!(channel = %channel.config.name, id = id.0, "dropping slow channel");
                    // Best effort; the buffer is likely still full.
                    let _ = channel.sender.try_send(FeedEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }

        delivered
    }

    /// Drop every channel.
    pub fn close(&self) {
        let mut channels = self.channels.write();
        for (_, channel) in channels.drain() {
            let _ = channel.sender.try_send(FeedEvent::Dropped {
                reason: DropReason::Closed,
            });
        }
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::{ChannelFilter, RowChange};
    use std::time::Duration;

    fn insert(id: &str, parent: &str) -> ChangeEvent {
        ChangeEvent::Insert {
            new: RowChange::new(id).with_parent(parent),
        }
    }

    fn subscribed(hub: &FeedHub, filter: ChannelFilter) -> ChannelHandle {
        let handle = hub.subscribe(ChannelConfig::new("test", filter));
        let ack = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(ack, FeedEvent::Subscribed);
        handle
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let hub = FeedHub::new();
        let handle = hub.subscribe(ChannelConfig::new("issues", ChannelFilter::table("issues")));
        assert_eq!(hub.channel_count(), 1);

        hub.unsubscribe(handle.id);
        assert_eq!(hub.channel_count(), 0);

        assert_eq!(handle.try_recv().unwrap(), FeedEvent::Subscribed);
        assert_eq!(
            handle.try_recv().unwrap(),
            FeedEvent::Dropped { reason: DropReason::Unsubscribed }
        );
    }

    #[test]
    fn test_publish_to_matching() {
        let hub = FeedHub::new();
        let handle = subscribed(&hub, ChannelFilter::for_parent("issues", "p1"));

        assert_eq!(hub.publish("issues", &insert("1", "p1")), 1);

        match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
            FeedEvent::Change { table, change } => {
                assert_eq!(table, "issues");
                assert_eq!(change.item_id().as_str(), "1");
            }
            other => panic!("Expected Change event, got {:?}", other),
        }
    }

    #[test]
    fn test_publish_filters_non_matching() {
        let hub = FeedHub::new();
        let handle = subscribed(&hub, ChannelFilter::for_parent("issues", "p1"));

        assert_eq!(hub.publish("issues", &insert("1", "p2")), 0);
        assert_eq!(hub.publish("comments", &insert("1", "p1")), 0);

        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_drop_slow_channel() {
        let hub = FeedHub::new();
        let _handle = hub.subscribe(
            ChannelConfig::new("slow", ChannelFilter::table("issues")).with_buffer_size(2),
        );

        for i in 0..10 {
            hub.publish("issues", &insert(&i.to_string(), "p1"));
        }

        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_disconnected_receiver_is_dropped() {
        let hub = FeedHub::new();
        let handle = hub.subscribe(ChannelConfig::new("gone", ChannelFilter::table("issues")));
        drop(handle);

        assert_eq!(hub.publish("issues", &insert("1", "p1")), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_close_drops_all() {
        let hub = FeedHub::new();
        let a = subscribed(&hub, ChannelFilter::table("issues"));
        let _b = subscribed(&hub, ChannelFilter::table("comments"));

        hub.close();
        assert_eq!(hub.channel_count(), 0);
        assert_eq!(a.try_recv().unwrap(), FeedEvent::Dropped { reason: DropReason::Closed });
    }
}
