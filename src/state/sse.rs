use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Fan-out of session notices; subscribers filter on the room they follow.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; returns how many subscribers it reached.
    pub fn publish(&self, event: ServerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribers currently connected.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
