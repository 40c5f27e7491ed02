//! Subscriber registry and broadcast step.
//!
//! The registry is the one shared mutable structure in the relay.
//! Insertions happen on upgrade completion, removals on close/EOF or
//! write failure, each exactly once. Broadcast iterates a snapshot of
//! the registry, so a failing subscriber never invalidates delivery to
//! the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Outbound frames queued per subscriber before the slow-consumer
/// policy kicks in.
const SUBSCRIBER_QUEUE: usize = 1024;

/// How long a broadcast handoff may block on one subscriber before
/// that subscriber is declared slow and dropped.
pub const SLOW_CONSUMER_TIMEOUT: Duration = Duration::from_millis(500);

struct Subscriber {
    tx: mpsc::Sender<Message>,
    connected_at: Instant,
}

/// Summary row for the `/clients` endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubscriberSummary {
    pub id: String,
    pub connected_secs: u64,
}

#[derive(Default)]
pub struct Hub {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new subscriber; the returned receiver feeds its
    /// writer task.
    pub async fn register(&self) -> (SubscriberId, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let id = Uuid::new_v4();

        let mut guard = self.subscribers.write().await;
        guard.insert(
            id,
            Subscriber {
                tx,
                connected_at: Instant::now(),
            },
        );
        info!("subscriber {id} registered ({} total)", guard.len());
        (id, rx)
    }

    /// Remove a subscriber. Idempotent: late write-failure removals
    /// racing a close-frame removal are fine.
    pub async fn deregister(&self, id: SubscriberId) {
        let mut guard = self.subscribers.write().await;
        if guard.remove(&id).is_some() {
            info!("subscriber {id} deregistered ({} left)", guard.len());
        }
    }

    /// Offer one already-serialized buffer to every subscriber.
    ///
    /// Delivery is independent per subscriber: a handoff that fails or
    /// exceeds [`SLOW_CONSUMER_TIMEOUT`] drops that subscriber only.
    pub async fn broadcast(&self, text: &str) {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Message>)> = {
            let guard = self.subscribers.read().await;
            guard.iter().map(|(id, s)| (*id, s.tx.clone())).collect()
        };

        if snapshot.is_empty() {
            return;
        }

        let mut dead = Vec::new();
        for (id, tx) in snapshot {
            let msg = Message::Text(text.to_string());
            match tx.send_timeout(msg, SLOW_CONSUMER_TIMEOUT).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!("subscriber {id} too slow, dropping");
                    dead.push(id);
                }
                Err(SendTimeoutError::Closed(_)) => {
                    debug!("subscriber {id} gone, dropping");
                    dead.push(id);
                }
            }
        }

        for id in dead {
            self.deregister(id).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn summaries(&self) -> Vec<SubscriberSummary> {
        let guard = self.subscribers.read().await;
        guard
            .iter()
            .map(|(id, s)| SubscriberSummary {
                id: id.to_string(),
                connected_secs: s.connected_at.elapsed().as_secs(),
            })
            .collect()
    }

    /// Shutdown epilogue: offer a close frame to everyone and clear
    /// the registry.
    pub async fn close_all(&self) {
        let mut guard = self.subscribers.write().await;
        for (id, sub) in guard.drain() {
            let _ = sub.tx.try_send(Message::Close(None));
            debug!("sent close frame to subscriber {id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_live_subscribers() {
        let hub = Hub::new();
        let (_a, mut rx_a) = hub.register().await;
        let (_b, mut rx_b) = hub.register().await;

        hub.broadcast("hello").await;

        assert_eq!(rx_a.recv().await.unwrap(), Message::Text("hello".into()));
        assert_eq!(rx_b.recv().await.unwrap(), Message::Text("hello".into()));
    }

    #[tokio::test]
    async fn closed_subscriber_is_removed_on_broadcast() {
        let hub = Hub::new();
        let (_a, rx_a) = hub.register().await;
        let (_b, mut rx_b) = hub.register().await;
        drop(rx_a);

        hub.broadcast("ping").await;

        assert_eq!(hub.len().await, 1);
        assert_eq!(rx_b.recv().await.unwrap(), Message::Text("ping".into()));
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_the_others() {
        let hub = Hub::new();
        let (_slow, rx_slow) = hub.register().await;
        let (_fast, mut rx_fast) = hub.register().await;

        // The fast subscriber keeps reading; the slow one never does.
        let collector = tokio::spawn(async move {
            let mut seen = 0usize;
            while let Some(msg) = rx_fast.recv().await {
                seen += 1;
                if msg == Message::Text("overflow".into()) {
                    break;
                }
            }
            seen
        });

        // Saturate the slow subscriber's queue, then push one more:
        // that handoff times out and drops only the slow subscriber,
        // within the bounded slow-consumer window.
        for _ in 0..SUBSCRIBER_QUEUE {
            hub.broadcast("fill").await;
        }
        let before = Instant::now();
        hub.broadcast("overflow").await;
        assert!(before.elapsed() < Duration::from_secs(2));

        assert_eq!(hub.len().await, 1);
        assert_eq!(collector.await.unwrap(), SUBSCRIBER_QUEUE + 1);

        drop(rx_slow);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let hub = Hub::new();
        let (id, _rx) = hub.register().await;

        hub.deregister(id).await;
        hub.deregister(id).await;
        assert_eq!(hub.len().await, 0);
    }
}
