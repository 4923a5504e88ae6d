//! Event broadcaster for object change events.
//!
//! The `EventBroadcaster` is the bus between the store and its watchers. It
//! uses tokio's broadcast channel for multi-producer, multi-consumer messaging.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::ObjectEvent;
use crate::resource::ObjectKey;

/// Default buffer size for the broadcast channel.
/// Events beyond this limit will cause older events to be dropped for slow receivers.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Broadcaster for object events.
///
/// Cheap to clone; every clone sends into the same channel.
///
/// # Example
///
/// ```
/// use kubeteach_core::ObjectKey;
/// use kubeteach_core::events::EventBroadcaster;
///
/// let broadcaster = EventBroadcaster::new();
/// let mut receiver = broadcaster.subscribe();
///
/// broadcaster.send_created(
///     ObjectKey::new("ExerciseSet", "default", "intro"),
///     serde_json::json!({}),
/// );
///
/// // Receive in another task
/// // let event = receiver.recv().await.unwrap();
/// ```
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ObjectEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new broadcaster with custom buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new broadcaster wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns 0 if there are no active subscribers.
    pub fn send(&self, event: ObjectEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Send an "object created" event.
    pub fn send_created(&self, key: ObjectKey, object: serde_json::Value) -> usize {
        self.send(ObjectEvent::created(key, object))
    }

    /// Send an "object updated" event.
    pub fn send_updated(&self, key: ObjectKey, object: serde_json::Value) -> usize {
        self.send(ObjectEvent::updated(key, object))
    }

    /// Send an "object status patched" event.
    pub fn send_status_patched(&self, key: ObjectKey, object: serde_json::Value) -> usize {
        self.send(ObjectEvent::status_patched(key, object))
    }

    /// Send an "object deleted" event.
    pub fn send_deleted(&self, key: ObjectKey, last_state: Option<serde_json::Value>) -> usize {
        self.send(ObjectEvent::deleted(key, last_state))
    }

    /// Subscribe to events.
    ///
    /// Events sent before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ObjectEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ObjectEventType;

    fn key() -> ObjectKey {
        ObjectKey::new("ExerciseSet", "default", "intro")
    }

    #[test]
    fn test_broadcaster_creation() {
        let broadcaster = EventBroadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_broadcaster_no_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let count = broadcaster.send_created(key(), serde_json::json!({}));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_broadcaster_send_receive() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        broadcaster.send_status_patched(key(), serde_json::json!({"status": {}}));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type, ObjectEventType::StatusPatched);
        assert_eq!(event.key, key());
    }

    #[tokio::test]
    async fn test_broadcaster_multiple_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver1 = broadcaster.subscribe();
        let mut receiver2 = broadcaster.subscribe();

        assert_eq!(broadcaster.subscriber_count(), 2);

        let count = broadcaster.send_deleted(key(), None);
        assert_eq!(count, 2);

        let event1 = receiver1.recv().await.unwrap();
        let event2 = receiver2.recv().await.unwrap();
        assert_eq!(event1.event_type, ObjectEventType::Deleted);
        assert_eq!(event2.event_type, ObjectEventType::Deleted);
    }

    #[test]
    fn test_broadcaster_shared() {
        let broadcaster = EventBroadcaster::new_shared();
        let broadcaster2 = broadcaster.clone();

        let _receiver = broadcaster.subscribe();
        assert_eq!(broadcaster2.subscriber_count(), 1);
    }
}
