use tokio::sync::broadcast;
use tracing::trace;

use super::types::MonitorEvent;

/// Default capacity of the broadcast ring used by [`BroadcastEventSink`]
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// One-way outbound channel for observer events.
///
/// Implementations must return immediately; delivery is best effort.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: MonitorEvent);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: MonitorEvent) {}
}

/// Sink that fans events out to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest events; with no subscribers the
/// event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<MonitorEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: MonitorEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!(event = %e.0.event, "No observers for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use serde_json::json;

    #[tokio::test]
    async fn broadcast_reaches_subscriber() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();

        sink.publish(MonitorEvent::new(EventKind::DeviceRegistered, json!({"extension": "201"})));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event, EventKind::DeviceRegistered);
        assert_eq!(ev.payload["extension"], "201");
    }

    #[test]
    fn publish_without_subscribers_does_not_fail() {
        let sink = BroadcastEventSink::default();
        assert_eq!(sink.subscriber_count(), 0);
        sink.publish(MonitorEvent::new(EventKind::CallUpdate, json!([])));
        NullEventSink.publish(MonitorEvent::new(EventKind::CallUpdate, json!([])));
    }
}
