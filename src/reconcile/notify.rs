//! Progress and change events.
//!
//! The engine publishes [`Event`]s on a broadcast channel; transports (web
//! socket push, CLI progress output) subscribe independently. Events are
//! serde-serializable so a transport can forward them verbatim.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::JobStatus;

/// Default channel capacity; slow subscribers lag rather than block the engine.
const CHANNEL_CAPACITY: usize = 256;

/// Something a refresh wants the outside world to know.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Batch progress, one per processed book plus a final completion event.
    BatchProgress {
        /// Absent for direct-apply (non-review) runs, which have no job record.
        job_id: Option<i64>,
        completed: i64,
        total: i64,
        message: String,
        status: JobStatus,
    },
    /// A book's stored metadata was changed by a direct-apply refresh.
    MetadataUpdated { book_id: i64, title: Option<String> },
    /// Free-form log line for the activity feed.
    Log { message: String },
}

/// Publish/subscribe channel for [`Event`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: Event) {
        debug!(?event, "emitting event");
        let _ = self.tx.send(event);
    }

    /// Convenience for the activity feed.
    pub fn log(&self, message: impl Into<String>) {
        self.emit(Event::Log {
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(Event::MetadataUpdated {
            book_id: 42,
            title: Some("Dune".to_string()),
        });

        match rx.recv().await.unwrap() {
            Event::MetadataUpdated { book_id, title } => {
                assert_eq!(book_id, 42);
                assert_eq!(title.as_deref(), Some("Dune"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.log("nobody is listening");
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::BatchProgress {
            job_id: Some(3),
            completed: 1,
            total: 5,
            message: "Fetching metadata for Dune".to_string(),
            status: JobStatus::InProgress,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"batch_progress""#));
        assert!(json.contains(r#""status":"in_progress""#));
    }
}
