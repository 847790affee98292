//! Cross-context sync bus
//!
//! Fire-and-forget broadcast of "a record changed" events to every
//! other live view of the same app instance. The bus carries no data
//! ownership: subscribers re-fetch from the record store rather than
//! trusting the payload, since the referenced record may already be
//! gone by the time a handler runs.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::SYNC_BUS_CAPACITY;

/// What kind of change happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// The whole store was wiped
    Cleared,
}

/// A single change notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Absent only for `Cleared`
    pub id: Option<String>,
    /// New used state, carried for `Updated` events
    pub is_used: Option<bool>,
}

impl ChangeEvent {
    pub fn created(id: &str) -> Self {
        Self {
            kind: ChangeKind::Created,
            id: Some(id.to_string()),
            is_used: None,
        }
    }

    pub fn updated(id: &str, is_used: bool) -> Self {
        Self {
            kind: ChangeKind::Updated,
            id: Some(id.to_string()),
            is_used: Some(is_used),
        }
    }

    pub fn deleted(id: &str) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            id: Some(id.to_string()),
            is_used: None,
        }
    }

    pub fn cleared() -> Self {
        Self {
            kind: ChangeKind::Cleared,
            id: None,
            is_used: None,
        }
    }
}

/// Broadcast channel shared by every view of one app instance
#[derive(Clone)]
pub struct SyncBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl SyncBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SYNC_BUS_CAPACITY);
        Self { tx }
    }

    /// Register a new subscriber. Each subscriber sees every event
    /// broadcast after this call, including events from its own
    /// context.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish a change. At-most-once, no redelivery; an error here
    /// only means nobody is listening, which is fine.
    pub fn broadcast(&self, event: ChangeEvent) {
        tracing::debug!("Broadcasting change: {:?}", event);

        if self.tx.send(event).is_err() {
            tracing::trace!("No active subscribers on sync bus");
        }
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_broadcast() {
        let bus = SyncBus::new();
        let mut rx = bus.subscribe();

        bus.broadcast(ChangeEvent::created("c1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_all_subscribers_notified() {
        let bus = SyncBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.broadcast(ChangeEvent::updated("c1", true));

        assert_eq!(rx1.recv().await.unwrap().is_used, Some(true));
        assert_eq!(rx2.recv().await.unwrap().is_used, Some(true));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_fine() {
        let bus = SyncBus::new();
        bus.broadcast(ChangeEvent::deleted("gone"));
    }

    #[tokio::test]
    async fn test_subscriber_misses_events_sent_before_subscribe() {
        let bus = SyncBus::new();
        bus.broadcast(ChangeEvent::created("early"));

        let mut rx = bus.subscribe();
        bus.broadcast(ChangeEvent::created("late"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id.as_deref(), Some("late"));
    }
}
