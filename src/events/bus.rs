//! # The engine's event channel.
//!
//! [`Bus`] carries [`LifecycleEvent`]s from the lifecycle engine to anyone
//! who cares: the observer bridge, tests, or the host directly. It wraps a
//! [`tokio::sync::broadcast`] channel because that is exactly the contract
//! the engine needs — publishing must never wait on a consumer.
//!
//! ## Rules
//! - `publish` never blocks or awaits; with no active receivers the event
//!   is simply gone (no persistence, no replay).
//! - All receivers share one bounded ring of recent events; a receiver that
//!   falls behind sees `RecvError::Lagged(n)` and skips the `n` oldest
//!   events. Use the event's `seq` to detect gaps.
//! - A receiver only observes events published after it subscribed.

use tokio::sync::broadcast;

use super::event::LifecycleEvent;

/// Broadcast channel for lifecycle events.
///
/// Cheap to clone (internally an `Arc`-backed sender); the engine and any
/// number of helpers may publish concurrently, and every receiver gets its
/// own copy of each event.
#[derive(Clone, Debug)]
pub struct Bus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl Bus {
    /// Creates a bus whose ring holds `capacity` recent events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to every active receiver and returns how many
    /// there were. Zero means the event went nowhere.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates an independent receiver observing subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Number of currently active receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let delivered = bus.publish(LifecycleEvent::new(EventKind::QuitRequested));
        assert_eq!(delivered, 1);

        let ev = rx.recv().await.expect("event delivered");
        assert_eq!(ev.kind, EventKind::QuitRequested);
    }

    #[tokio::test]
    async fn test_publish_without_receivers_does_not_block() {
        let bus = Bus::new(1);
        assert_eq!(bus.publish(LifecycleEvent::new(EventKind::JoinsSettled)), 0);

        // A receiver subscribed afterwards only sees later events.
        let mut rx = bus.subscribe();
        bus.publish(LifecycleEvent::new(EventKind::QuitRequested));
        let ev = rx.recv().await.expect("event delivered");
        assert_eq!(ev.kind, EventKind::QuitRequested);
    }
}
