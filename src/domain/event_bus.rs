//! Broadcast channel for read-model updates.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The read model
//! and the submission tracker publish a [`ClaimUpdate`] for every change,
//! and each WebSocket connection subscribes and filters by claim id.

use tokio::sync::broadcast;

use super::ClaimUpdate;

/// Broadcast bus for [`ClaimUpdate`]s.
///
/// Lagging receivers lose the oldest updates once the ring buffer is full;
/// publishers never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClaimUpdate>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an update to all subscribers.
    ///
    /// Returns the number of receivers that got the update; with no
    /// receivers the update is dropped.
    pub fn publish(&self, update: ClaimUpdate) -> usize {
        self.sender.send(update).unwrap_or(0)
    }

    /// Creates a receiver for all future updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClaimUpdate> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
