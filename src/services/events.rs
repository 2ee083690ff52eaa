//! Event system for feed operations
//!
//! Services emit a `FeedEvent` after each committed mutation. The binary
//! attaches a logging listener as an audit trail; other subscribers (cache
//! invalidation, live updates) can attach the same way.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Feed events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    // Post events
    PostCreated {
        id: String,
        group_id: String,
        author_member_id: String,
        media_count: usize,
    },
    PostDeleted {
        id: String,
        group_id: String,
    },

    // Engagement events
    LikeToggled {
        post_id: String,
        member_id: String,
        liked: bool,
        like_count: i32,
    },
    CommentAdded {
        id: String,
        post_id: String,
        author_member_id: String,
    },
    CommentDeleted {
        id: String,
        post_id: String,
    },

    // Challenge events
    ChallengeCreated {
        id: String,
        group_id: String,
        tag: String,
    },
    ChallengeUpdated {
        id: String,
    },
    ChallengeDeleted {
        id: String,
        group_id: String,
    },
    ParticipationRecorded {
        challenge_id: String,
        post_id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &FeedEvent);
}

/// Event bus for broadcasting feed events
pub struct EventBus {
    sender: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: FeedEvent) {
        trace!(event = ?event, "Emitting feed event");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &FeedEvent) {
        match event {
            FeedEvent::PostCreated { id, group_id, media_count, .. } => {
                info!(post_id = %id, group_id = %group_id, media = media_count, "Post created");
            }
            FeedEvent::PostDeleted { id, group_id } => {
                info!(post_id = %id, group_id = %group_id, "Post deleted");
            }
            FeedEvent::ChallengeCreated { id, group_id, tag } => {
                info!(challenge_id = %id, group_id = %group_id, tag = %tag, "Challenge created");
            }
            FeedEvent::ChallengeDeleted { id, group_id } => {
                info!(challenge_id = %id, group_id = %group_id, "Challenge deleted");
            }
            FeedEvent::ParticipationRecorded { challenge_id, post_id } => {
                debug!(challenge_id = %challenge_id, post_id = %post_id, "Participation recorded");
            }
            _ => {
                debug!(event = ?event, "Feed event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(FeedEvent::LikeToggled {
            post_id: "p-1".into(),
            member_id: "m-1".into(),
            liked: true,
            like_count: 1,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        assert_eq!(
            event,
            FeedEvent::LikeToggled {
                post_id: "p-1".into(),
                member_id: "m-1".into(),
                liked: true,
                like_count: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_logging_listener_stops_when_bus_dropped() {
        let bus = Arc::new(EventBus::new());
        let handle = spawn_logging_listener(bus.clone());
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(FeedEvent::PostDeleted {
            id: "p-1".into(),
            group_id: "g-1".into(),
        });
        drop(bus);

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener did not stop")
            .unwrap();
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        bus.emit(FeedEvent::ChallengeUpdated { id: "c-1".into() });
    }
}
