//! Event sinks

use fleet_model::Event;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Receiver of detected events
pub trait EventSink: Send + Sync {
    fn event_detected(&self, event: Event);
}

/// Sink that buffers events in memory
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Remove and return the collected events
    pub fn take(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn event_detected(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Sink forwarding events into a tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn event_detected(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            warn!("Dropping {} event: receiver closed", e.0.event_type.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleet_model::{EventType, Position};

    fn event() -> Event {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Event::new(EventType::GeofenceEnter, &Position::new(1, 1, t, 0.0, 0.0))
    }

    #[test]
    fn test_collecting_sink_take() {
        let sink = CollectingSink::new();
        sink.event_detected(event());
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.event_detected(event());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EventType::GeofenceEnter);

        drop(rx);
        // Closed receiver only logs
        sink.event_detected(event());
    }
}
