//! Domain event system — progress reporting without coupling.
//!
//! The research loop publishes an event at every transition. Transports (the
//! CLI today) subscribe to render progress; nobody is required to listen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::research::ActionKind;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A research run started for a question
    ResearchStarted {
        question: String,
        max_steps: u32,
        timestamp: DateTime<Utc>,
    },

    /// The oracle picked the next action
    ActionDecided {
        step: u32,
        action: ActionKind,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// A search finished (possibly degraded to zero results)
    SearchCompleted {
        query: String,
        result_count: usize,
        failed: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A scrape batch finished
    ScrapeCompleted {
        url_count: usize,
        failed_count: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The loop reached a terminal state and handed off to the composer
    ResearchTerminated {
        steps: u32,
        forced: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::SearchCompleted {
            query: "masters 2024".into(),
            result_count: 10,
            failed: false,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::SearchCompleted {
                query,
                result_count,
                ..
            } => {
                assert_eq!(query, "masters 2024");
                assert_eq!(*result_count, 10);
            }
            _ => panic!("Expected SearchCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ResearchTerminated {
            steps: 3,
            forced: false,
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = DomainEvent::ActionDecided {
            step: 1,
            action: ActionKind::Scrape,
            detail: "2 urls".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"action_decided""#));
        assert!(json.contains(r#""action":"scrape""#));
    }
}
