//! Change notifications for UI adapters.

use parley_core::conversation::ConversationKey;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Something observable changed in the registry.
///
/// Events only name what changed; the current state is read from the latest
/// conversation snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouterEvent {
    ConversationCreated { id: Uuid, key: ConversationKey },
    MessageAppended { id: Uuid, index: usize },
    /// Name, session id or status changed.
    ConversationUpdated { id: Uuid },
    RosterChanged { id: Uuid },
    TypingChanged { id: Uuid, typing: Vec<String> },
    ActiveChanged { id: Uuid },
    UnreadChanged { id: Uuid, unread_count: u32 },
    /// All conversations were dropped (logout or explicit reset).
    SessionReset,
}

pub type EventReceiver = broadcast::Receiver<RouterEvent>;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    pub fn new(size: usize) -> Self {
        let (tx, _) = broadcast::channel(size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: RouterEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(RouterEvent::SessionReset);
        assert_eq!(rx.recv().await.unwrap(), RouterEvent::SessionReset);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(0);
        bus.publish(RouterEvent::SessionReset);
    }
}
