//! Listener that merges a channel's changes into a board.

use crate::backend::{Backend, ISSUES_TABLE};
use crate::board::{Board, ChangeOutcome};
use crate::config::ClientConfig;
use crate::error::{Result, SyncError};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::hub::FeedHub;
use super::types::{
    ChannelConfig, ChannelFilter, ChannelHandle, FeedEvent, SubscriptionState,
};

/// Subscribes to one channel and applies what arrives to a board.
///
/// `Unsubscribed -> Subscribing -> Subscribed -> Unsubscribing -> Unsubscribed`.
/// Events are applied only while `Subscribed`; nothing is kept after
/// teardown.
pub struct ChangeFeedListener {
    config: ChannelConfig,
    state: SubscriptionState,
    handle: Option<ChannelHandle>,
}

impl ChangeFeedListener {
    /// Listener for an arbitrary channel, initially unsubscribed.
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            state: SubscriptionState::Unsubscribed,
            handle: None,
        }
    }

    /// Listener for the item changes of `board`'s parent.
    pub fn for_board<B: Backend>(board: &Board<B>, buffer_size: usize) -> Self {
        let parent = board.parent_id();
        Self::new(
            ChannelConfig::new(
                format!("{ISSUES_TABLE}:{parent}"),
                ChannelFilter::for_parent(ISSUES_TABLE, parent),
            )
            .with_buffer_size(buffer_size),
        )
    }

    /// Listener for `board` sized by the client's `feed_buffer_size`.
    pub fn with_config<B: Backend>(board: &Board<B>, config: &ClientConfig) -> Self {
        Self::for_board(board, config.feed_buffer_size)
    }

    /// Current subscription state.
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Open the channel. Only valid from `Unsubscribed`.
    pub fn subscribe(&mut self, hub: &FeedHub) -> Result<()> {
        if self.state != SubscriptionState::Unsubscribed {
            return Err(self.invalid(SubscriptionState::Subscribing));
        }

        self.state = SubscriptionState::Subscribing;
        self.handle = Some(hub.subscribe(self.config.clone()));
        debug!(channel = %self.config.name, "subscribing");
        Ok(())
    }

    /// Tear the channel down, discarding anything still buffered.
    pub fn unsubscribe(&mut self, hub: &FeedHub) -> Result<()> {
        match self.state {
            SubscriptionState::Subscribing | SubscriptionState::Subscribed => {}
            _ => return Err(self.invalid(SubscriptionState::Unsubscribing)),
        }

        self.state = SubscriptionState::Unsubscribing;
        if let Some(handle) = self.handle.take() {
            hub.unsubscribe(handle.id);
        }
        self.state = SubscriptionState::Unsubscribed;
        info!(channel = %self.config.name, "unsubscribed");
        Ok(())
    }

    /// Apply everything currently buffered without blocking.
    pub fn poll<B: Backend>(&mut self, board: &Board<B>) -> Vec<ChangeOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let Some(ref handle) = self.handle else {
                break;
            };
            match handle.try_recv() {
                Ok(event) => self.handle_event(event, board, &mut outcomes),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed();
                    break;
                }
            }
        }
        outcomes
    }

    /// Wait up to `timeout` for the next event, then drain the rest.
    pub fn poll_timeout<B: Backend>(
        &mut self,
        board: &Board<B>,
        timeout: Duration,
    ) -> Result<Vec<ChangeOutcome>> {
        let Some(ref handle) = self.handle else {
            return Err(SyncError::ChannelClosed(self.config.name.clone()));
        };

        let mut outcomes = Vec::new();
        match handle.recv_timeout(timeout) {
            Ok(event) => self.handle_event(event, board, &mut outcomes),
            Err(RecvTimeoutError::Timeout) => return Ok(outcomes),
            Err(RecvTimeoutError::Disconnected) => {
                self.closed();
                return Err(SyncError::ChannelClosed(self.config.name.clone()));
            }
        }
        outcomes.extend(self.poll(board));
        Ok(outcomes)
    }

    fn handle_event<B: Backend>(
        &mut self,
        event: FeedEvent,
        board: &Board<B>,
        outcomes: &mut Vec<ChangeOutcome>,
    ) {
        match event {
            FeedEvent::Subscribed => {
                if self.state == SubscriptionState::Subscribing {
                    self.state = SubscriptionState::Subscribed;
                    info!(channel = %self.config.name, "subscribed");
                }
            }
            FeedEvent::Change { change, .. } => {
                if self.state == SubscriptionState::Subscribed {
                    outcomes.push(board.apply_change(&change));
                } else {
                    debug!(channel = %self.config.name, state = %self.state, "change ignored");
                }
            }
            FeedEvent::Dropped { reason } => {
                warn!(channel = %self.config.name, ?reason, "channel dropped");
                self.handle = None;
                self.state = SubscriptionState::Unsubscribed;
            }
        }
    }

    fn closed(&mut self) {
        warn!(channel = %self.config.name, "channel disconnected");
        self.handle = None;
        self.state = SubscriptionState::Unsubscribed;
    }

    fn invalid(&self, to: SubscriptionState) -> SyncError {
        SyncError::InvalidTransition {
            from: self.state.as_str(),
            to: to.as_str(),
        }
    }
}
