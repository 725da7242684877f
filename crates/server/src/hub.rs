// crates/server/src/hub.rs
//! Fan-out of stream events to connected subscribers.
//!
//! Delivery is best-effort: a subscriber whose send fails (disconnected, or
//! its small buffer is full) is dropped on the spot. Nothing is retried or
//! queued; the next status snapshot brings any subscriber back up to date.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ingest_monitor_types::StreamEvent;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::metrics::{record_pruned, record_subscribers};

/// Per-subscriber buffer for [`BroadcastHub::subscribe`].
pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 16;

pub type SubscriberId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("subscriber disconnected")]
    Closed,
    #[error("subscriber buffer full")]
    Full,
}

/// Something that can receive stream events.
pub trait EventSink: Send + Sync {
    /// Non-blocking send. Any error removes the sink from the hub.
    fn send(&self, event: &StreamEvent) -> Result<(), SinkError>;

    fn is_closed(&self) -> bool;
}

impl EventSink for mpsc::Sender<StreamEvent> {
    fn send(&self, event: &StreamEvent) -> Result<(), SinkError> {
        self.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}

/// Receiving half handed to a new subscriber.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<StreamEvent>,
}

#[derive(Default)]
struct HubInner {
    next_id: SubscriberId,
    sinks: HashMap<SubscriberId, Box<dyn EventSink>>,
}

#[derive(Default)]
pub struct BroadcastHub {
    inner: Mutex<HubInner>,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a channel-backed subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let id = self.attach(Box::new(tx));
        Subscription { id, rx }
    }

    /// Register an arbitrary sink.
    pub fn attach(&self, sink: Box<dyn EventSink>) -> SubscriberId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.sinks.insert(id, sink);
        let count = inner.sinks.len();
        drop(inner);

        record_subscribers(count);
        tracing::debug!(subscriber_id = id, subscribers = count, "Subscriber attached");
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.lock();
        let removed = inner.sinks.remove(&id).is_some();
        let count = inner.sinks.len();
        drop(inner);

        if removed {
            record_subscribers(count);
            tracing::debug!(subscriber_id = id, subscribers = count, "Subscriber detached");
        }
    }

    /// Send `event` to every subscriber, pruning the ones that fail.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, event: &StreamEvent) -> usize {
        let mut inner = self.lock();
        let mut failed = Vec::new();
        let mut delivered = 0;

        for (id, sink) in inner.sinks.iter() {
            if sink.is_closed() {
                failed.push((*id, SinkError::Closed));
                continue;
            }
            match sink.send(event) {
                Ok(()) => delivered += 1,
                Err(e) => failed.push((*id, e)),
            }
        }

        for (id, _) in &failed {
            inner.sinks.remove(id);
        }
        let count = inner.sinks.len();
        drop(inner);

        if !failed.is_empty() {
            for (id, reason) in &failed {
                tracing::debug!(
                    subscriber_id = id,
                    event = event.kind(),
                    reason = %reason,
                    "Pruned subscriber after failed send"
                );
            }
            record_pruned(failed.len());
            record_subscribers(count);
        }

        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unsubscribes when dropped, so a stream that ends for any reason
/// (client gone, task cancelled) releases its slot.
pub struct SubscriptionGuard {
    id: SubscriberId,
    hub: Arc<BroadcastHub>,
}

impl SubscriptionGuard {
    pub fn new(id: SubscriberId, hub: Arc<BroadcastHub>) -> Self {
        Self { id, hub }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
