//! In-process publisher backed by tokio broadcast channels.
//!
//! One channel per topic, created on first subscription. Publishing to a
//! topic nobody subscribed to costs a map lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use crate::core::{DEFAULT_TOPIC_CAPACITY, Publish, Topic};
use crate::records::Record;

/// Publisher delivering records to in-process subscribers.
///
/// Slow subscribers lag and lose the oldest records rather than blocking the
/// publisher (see [`broadcast::error::RecvError::Lagged`]).
#[derive(Debug)]
pub struct BroadcastPublisher {
    channels: RwLock<HashMap<Topic, broadcast::Sender<Arc<Record>>>>,
    capacity: usize,
    delivered: AtomicU64,
    unheard: AtomicU64,
}

impl BroadcastPublisher {
    /// Create a publisher with the default per-topic buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a publisher buffering `capacity` records per topic.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            delivered: AtomicU64::new(0),
            unheard: AtomicU64::new(0),
        }
    }

    /// Register a consumer on `topic`.
    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<Arc<Record>> {
        let mut channels = self.channels.write();
        channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of consumers currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.channels
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Records handed to at least one consumer.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Records published while nobody was listening.
    pub fn unheard(&self) -> u64 {
        self.unheard.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publish for BroadcastPublisher {
    fn publish(&self, topic: &Topic, record: Record) {
        let channels = self.channels.read();
        let Some(tx) = channels.get(topic).filter(|tx| tx.receiver_count() > 0) else {
            self.unheard.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let kind = record.type_name();
        match tx.send(Arc::new(record)) {
            Ok(receivers) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                trace!(%topic, kind, receivers, "record published");
            }
            // Last consumer went away since the check
            Err(_) => {
                self.unheard.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
