//! Broadcast hub.
//!
//! `publish` enqueues the payload onto every open subscriber queue with
//! `try_send`, so it never waits on a subscriber. Each subscriber's writer
//! task drains its own queue, which keeps a slow socket from delaying the
//! others. Queues are FIFO, so a subscriber that stays connected sees
//! messages in the order they were published.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tick_telemetry::Metrics;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::DeliveryError;
use crate::registry::{Payload, SubscriberId, SubscriberRegistry};
use crate::types::HubStats;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Subscribers the payload was enqueued for.
    pub delivered: usize,
    /// Subscribers skipped because their queue was full.
    pub dropped_full: usize,
    /// Subscribers whose queue closed between the open check and the send.
    pub dropped_closed: usize,
}

impl FanOut {
    pub fn dropped(&self) -> usize {
        self.dropped_full + self.dropped_closed
    }

    fn record(&mut self, result: Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(DeliveryError::QueueFull) => self.dropped_full += 1,
            Err(DeliveryError::Closed) => self.dropped_closed += 1,
        }
    }
}

#[derive(Default)]
struct Counters {
    ingested: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

struct HubInner {
    registry: SubscriberRegistry,
    queue_capacity: usize,
    producer_connected: AtomicBool,
    counters: Counters,
}

/// Single relay point from the producer to every subscriber.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// Create a hub whose subscribers each buffer up to `queue_capacity` messages.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: SubscriberRegistry::new(),
                queue_capacity: queue_capacity.max(1),
                producer_connected: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        }
    }

    /// Register a new subscriber. Dropping the returned handle unregisters it.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        let id = self.inner.registry.add(tx);
        let count = self.inner.registry.len();
        Metrics::subscribers_set(count);
        debug!(subscriber = %id, subscribers = count, "Subscriber registered");
        Subscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// Unregister a subscriber. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.registry.remove(id);
        if removed {
            let count = self.inner.registry.len();
            Metrics::subscribers_set(count);
            debug!(subscriber = %id, subscribers = count, "Subscriber removed");
        }
        removed
    }

    /// Ingest one producer message and fan it out unchanged.
    pub fn publish(&self, payload: impl Into<Payload>) -> FanOut {
        let payload = payload.into();
        self.inner.counters.ingested.fetch_add(1, Ordering::Relaxed);
        Metrics::ingested();

        let mut fan_out = FanOut::default();
        self.inner.registry.for_each_open(|id, queue| {
            let result = queue.try_send(Arc::clone(&payload)).map_err(DeliveryError::from);
            if let Err(e) = result {
                trace!(subscriber = %id, reason = e.reason(), "Message dropped for subscriber");
            }
            fan_out.record(result);
        });

        let counters = &self.inner.counters;
        counters
            .delivered
            .fetch_add(fan_out.delivered as u64, Ordering::Relaxed);
        counters
            .dropped
            .fetch_add(fan_out.dropped() as u64, Ordering::Relaxed);
        Metrics::delivered(fan_out.delivered as u64);
        Metrics::dropped(DeliveryError::QueueFull.reason(), fan_out.dropped_full as u64);
        Metrics::dropped(DeliveryError::Closed.reason(), fan_out.dropped_closed as u64);

        trace!(
            delivered = fan_out.delivered,
            dropped = fan_out.dropped(),
            "Fan-out complete"
        );
        fan_out
    }

    /// Mark the producer connection as open.
    pub fn producer_connected(&self) {
        self.inner.producer_connected.store(true, Ordering::Relaxed);
        Metrics::producer_connected();
        info!("Producer connected");
    }

    /// Mark the producer connection as gone. Subscribers stay connected.
    pub fn producer_terminated(&self, reason: &str) {
        self.inner.producer_connected.store(false, Ordering::Relaxed);
        Metrics::producer_disconnected();
        warn!(
            reason,
            subscribers = self.subscriber_count(),
            "Producer stream terminated, keeping subscribers"
        );
    }

    pub fn is_producer_connected(&self) -> bool {
        self.inner.producer_connected.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Read-only view of the registry.
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.inner.registry
    }

    pub fn stats(&self) -> HubStats {
        let counters = &self.inner.counters;
        HubStats {
            subscribers: self.subscriber_count(),
            producer_connected: self.is_producer_connected(),
            ingested_total: counters.ingested.load(Ordering::Relaxed),
            delivered_total: counters.delivered.load(Ordering::Relaxed),
            dropped_total: counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.subscriber_count())
            .field("queue_capacity", &self.inner.queue_capacity)
            .field("producer_connected", &self.is_producer_connected())
            .finish()
    }
}

/// Registered subscriber: the receiving end of its outbound queue.
///
/// Unregisters on drop, so a connection task that exits for any reason
/// leaves the registry.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Payload>,
    hub: BroadcastHub,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued payload. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Next queued payload without waiting.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
