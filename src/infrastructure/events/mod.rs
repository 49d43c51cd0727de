use crate::domains::sessions::entity::SessionStatus;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Buffer per subscriber. Small on purpose: a subscriber that cannot keep up
/// loses events instead of stalling the monitor.
pub const SUBSCRIBER_BUFFER: usize = 16;

/// Real-time update pushed to observers (SSE streams, notification sinks).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusChanged,
    Refresh,
    NotesUpdated,
    Snapshot,
}

impl Event {
    pub fn refresh() -> Self {
        Event {
            kind: EventKind::Refresh,
            session_id: None,
            status: None,
            title: None,
        }
    }

    pub fn snapshot() -> Self {
        Event {
            kind: EventKind::Snapshot,
            session_id: None,
            status: None,
            title: None,
        }
    }

    pub fn notes_updated(session_id: &str) -> Self {
        Event {
            kind: EventKind::NotesUpdated,
            session_id: Some(session_id.to_string()),
            status: None,
            title: None,
        }
    }

    pub fn status_changed(session_id: &str, status: SessionStatus, title: &str) -> Self {
        Event {
            kind: EventKind::StatusChanged,
            session_id: Some(session_id.to_string()),
            status: Some(status),
            title: Some(title.to_string()),
        }
    }
}

pub type SubscriberId = u64;

/// Fan-out to any number of subscribers with bounded buffers. `broadcast`
/// never blocks: a subscriber whose buffer is full drops that event, other
/// subscribers are unaffected.
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<Mutex<HashMap<SubscriberId, mpsc::Sender<Event>>>>,
    next_id: Arc<AtomicU64>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber map poisoned")
            .insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers
            .lock()
            .expect("subscriber map poisoned")
            .remove(&id);
    }

    pub fn broadcast(&self, event: Event) {
        let mut subscribers = self.subscribers.lock().expect("subscriber map poisoned");
        subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::debug!("subscriber {id} buffer full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("subscriber map poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_subscribers_receive() {
        let broadcaster = Broadcaster::new();
        let (_a, mut rx_a) = broadcaster.subscribe();
        let (_b, mut rx_b) = broadcaster.subscribe();

        broadcaster.broadcast(Event::refresh());
        assert_eq!(rx_a.recv().await.unwrap(), Event::refresh());
        assert_eq!(rx_b.recv().await.unwrap(), Event::refresh());
    }

    #[tokio::test]
    async fn full_subscriber_drops_without_blocking_others() {
        let broadcaster = Broadcaster::new();
        let (_slow, mut slow_rx) = broadcaster.subscribe();
        let (_fast, mut fast_rx) = broadcaster.subscribe();

        for _ in 0..SUBSCRIBER_BUFFER {
            broadcaster.broadcast(Event::refresh());
        }
        // The slow subscriber's buffer is now full; this event is dropped for
        // it only.
        let marker = Event::notes_updated("s1");
        // Drain the fast subscriber so it has room.
        for _ in 0..SUBSCRIBER_BUFFER {
            fast_rx.recv().await.unwrap();
        }
        broadcaster.broadcast(marker.clone());

        assert_eq!(fast_rx.recv().await.unwrap(), marker);
        let mut slow_events = Vec::new();
        while let Ok(e) = slow_rx.try_recv() {
            slow_events.push(e);
        }
        assert_eq!(slow_events.len(), SUBSCRIBER_BUFFER);
        assert!(!slow_events.contains(&marker));
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned() {
        let broadcaster = Broadcaster::new();
        let (id, rx) = broadcaster.subscribe();
        drop(rx);
        broadcaster.broadcast(Event::refresh());
        assert_eq!(broadcaster.subscriber_count(), 0);
        // Explicit unsubscribe after pruning is harmless.
        broadcaster.unsubscribe(id);
    }

    #[test]
    fn event_payload_shape() {
        let e = Event::status_changed("abc", SessionStatus::Waiting, "swift-fox");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["session_id"], "abc");
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["title"], "swift-fox");

        let json = serde_json::to_value(Event::refresh()).unwrap();
        assert_eq!(json["type"], "refresh");
        assert!(json.get("session_id").is_none());
    }
}
