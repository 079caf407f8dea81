//! Fan-out of feed events to every consumer.
//!
//! The connection manager is the only publisher. Consumers (the event log
//! in `main`, each `/ws` client) subscribe once and see status changes,
//! decoded messages and errors in the order the manager produced them. A
//! consumer that falls more than `capacity` events behind loses the oldest
//! ones and is told so by `RecvError::Lagged`.

use tokio::sync::broadcast;

use super::{FeedEvent, StatusChange};
use crate::error::FeedError;

/// Broadcast bus for [`FeedEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    /// Creates a bus keeping at most `capacity` undelivered events per
    /// receiver. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event and returns how many receivers got it.
    ///
    /// Status and error events published with nobody listening are logged,
    /// since they would otherwise vanish without trace. Unheard message
    /// events are normal before the first consumer attaches.
    pub fn publish(&self, event: FeedEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                if !matches!(event, FeedEvent::Message { .. }) {
                    tracing::debug!(event_type = event.event_type_str(), "no consumer for feed event");
                }
                0
            }
        }
    }

    /// Publishes a status change stamped now.
    pub fn publish_status(&self, status: StatusChange) -> usize {
        self.publish(FeedEvent::status(status))
    }

    /// Publishes an error event for `err`, stamped now.
    pub fn publish_error(&self, err: &FeedError) -> usize {
        self.publish(FeedEvent::error(err))
    }

    /// Creates a receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }
}
