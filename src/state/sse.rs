use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::{dto::sse::ServerEvent, state::game::SessionKey};

/// Per-session announcement streams, kept across game resets so listeners stay attached to a
/// chat guild rather than to one game.
pub struct SessionHubs {
    capacity: usize,
    hubs: DashMap<SessionKey, SseHub>,
}

impl SessionHubs {
    /// Build an empty hub set whose channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hubs: DashMap::new(),
        }
    }

    /// Register a new subscriber on the stream of `key`.
    pub fn subscribe(&self, key: &SessionKey) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(key.clone())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Send `event` on the stream of `key`, returning how many subscribers received it.
    pub fn broadcast(&self, key: &SessionKey, event: ServerEvent) -> usize {
        self.hubs
            .get(key)
            .map(|hub| hub.broadcast(event))
            .unwrap_or(0)
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, returning the number of receivers.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_stay_within_their_session() {
        let hubs = SessionHubs::new(4);
        let a = SessionKey::from("a");
        let b = SessionKey::from("b");
        let mut rx_a = hubs.subscribe(&a);
        let mut rx_b = hubs.subscribe(&b);

        let delivered = hubs.broadcast(&a, ServerEvent::new(Some("ping".into()), "1".into()));
        assert_eq!(delivered, 1);

        assert_eq!(rx_a.recv().await.unwrap().data, "1");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn broadcasting_without_listeners_reaches_nobody() {
        let hubs = SessionHubs::new(4);
        let key = SessionKey::from("a");
        assert_eq!(hubs.broadcast(&key, ServerEvent::new(None, "x".into())), 0);
    }
}
