//! Broadcast channel carrying [`StoreEvent`]s from a node store to its
//! observers (live topology, wizard views).
//!
//! No runtime is needed on either side: the store publishes with a plain
//! `send` and observers may drain with `try_recv`. A slow observer lags and
//! skips to newer events; every event carries a full snapshot, so the latest
//! one is always enough to catch up.

use std::fmt;

use chaosflow_types::event::StoreEvent;
use tokio::sync::broadcast;

/// Events buffered per observer before it starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Sending half of the store's channel. Clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event`, returning how many observers it reached. An event
    /// published with nobody listening is dropped.
    pub fn publish(&self, event: StoreEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaosflow_types::event::StoreChange;
    use chaosflow_types::workflow::{NodeId, StoreSnapshot};
    use tokio::sync::broadcast::error::TryRecvError;

    fn upserted(revision: u64) -> StoreEvent {
        StoreEvent {
            revision,
            change: StoreChange::Upserted {
                id: NodeId::from("a"),
            },
            snapshot: StoreSnapshot::default(),
            at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_observer_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(upserted(1)), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.revision, 1);
        assert!(matches!(event.change, StoreChange::Upserted { ref id } if id.as_str() == "a"));
    }

    #[test]
    fn test_every_observer_gets_a_copy() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish(upserted(7)), 2);
        assert_eq!(first.try_recv().unwrap().revision, 7);
        assert_eq!(second.try_recv().unwrap().revision, 7);
    }

    #[test]
    fn test_publish_without_observers_is_dropped() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(upserted(1)), 0);

        // A late observer does not see earlier events.
        let mut rx = bus.subscribe();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_slow_observer_lags_then_catches_up() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for revision in 1..=5 {
            bus.publish(upserted(revision));
        }

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(3))));
        assert_eq!(rx.try_recv().unwrap().revision, 4);
        assert_eq!(rx.try_recv().unwrap().revision, 5);
    }

    #[test]
    fn test_clones_share_the_channel() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.clone().publish(upserted(3));
        assert_eq!(rx.try_recv().unwrap().revision, 3);
        assert_eq!(format!("{bus:?}"), "EventBus { observers: 1 }");
    }
}
