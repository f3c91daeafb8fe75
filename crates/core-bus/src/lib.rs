//! Fan-out event bus (spec §4.A).
//!
//! `publish` delivers an event to every current subscriber whose filter
//! accepts it, in publish order per subscriber. Slow subscribers apply
//! backpressure to the publisher rather than losing events: each
//! subscriber owns a bounded channel and a full channel makes `publish`
//! wait for it to drain.
//!
//! Two implementations are provided: [`BroadcastBus`] (the default) and
//! [`NullBus`] (accepts publishes, yields an already-finished subscription;
//! for tests that don't care about events).

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use forge_protocol::Event;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::warn;

/// Default bound for a subscriber's queue. The spec requires "typical >= 64".
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A live subscription to the bus. `recv` yields events in publish order;
/// `cancel` (or dropping the subscription) stops further delivery.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Event>,
    bus: Arc<BroadcastInner>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the subscription is
    /// closed and fully drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Close the subscription. No further events are delivered; buffered
    /// events already sent are still retrievable via `recv` until drained.
    pub async fn cancel(&self) {
        self.bus.remove(self.id).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let bus = self.bus.clone();
            let id = self.id;
            handle.spawn(async move {
                bus.remove(id).await;
            });
        }
    }
}

/// A subscription that is immediately finished; used by [`NullBus`].
pub struct ClosedSubscription;

impl ClosedSubscription {
    pub async fn recv(&mut self) -> Option<Event> {
        None
    }

    pub async fn cancel(&self) {}
}

struct Subscriber {
    id: u64,
    session_filter: Option<String>,
    tx: mpsc::Sender<Event>,
}

struct BroadcastInner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl BroadcastInner {
    async fn remove(&self, id: u64) {
        let mut subs = self.subscribers.lock().await;
        subs.retain(|s| s.id != id);
    }
}

/// The default event bus: broadcasts to every subscriber whose filter
/// accepts the event, serializing per-subscriber delivery order with
/// publish order.
#[derive(Clone)]
pub struct BroadcastBus {
    inner: Arc<BroadcastInner>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(BroadcastInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                queue_capacity,
            }),
        }
    }

    /// Subscribe to events, optionally filtered to a single session id.
    /// Events without a `session_id` are never delivered to a filtered
    /// subscriber (spec §4.A).
    pub async fn subscribe(&self, session_filter: Option<String>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        self.inner.subscribers.lock().await.push(Subscriber {
            id,
            session_filter,
            tx,
        });
        Subscription {
            id,
            rx,
            bus: self.inner.clone(),
        }
    }

    /// Deliver `event` to every subscriber whose filter accepts it. A
    /// no-subscribers publish is a no-op. A publish to a full subscriber
    /// queue waits for that subscriber to drain rather than dropping the
    /// event. A subscriber whose receiver has been dropped is pruned
    /// silently; publish never fails.
    pub async fn publish(&self, event: Event) {
        let subs: Vec<(u64, mpsc::Sender<Event>)> = {
            let subs = self.inner.subscribers.lock().await;
            subs.iter()
                .filter(|s| accepts(s.session_filter.as_deref(), &event))
                .map(|s| (s.id, s.tx.clone()))
                .collect()
        };
        if subs.is_empty() {
            return;
        }
        let mut dead = Vec::new();
        for (id, tx) in subs {
            if tx.send(event.clone()).await.is_err() {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            let mut subs = self.inner.subscribers.lock().await;
            subs.retain(|s| !dead.contains(&s.id));
            debug!(count = dead.len(), "pruned closed bus subscriptions");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().await.len()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

fn accepts(filter: Option<&str>, event: &Event) -> bool {
    match filter {
        None => true,
        Some(session_id) => event.session_id() == Some(session_id),
    }
}

/// A bus that accepts publishes and yields an already-finished stream.
/// For tests that don't assert on event delivery.
#[derive(Clone, Default)]
pub struct NullBus;

impl NullBus {
    pub fn new() -> Self {
        Self
    }

    pub async fn publish(&self, event: Event) {
        warn!(kind = ?event.kind(), "NullBus discarding published event");
    }

    pub async fn subscribe(&self, _session_filter: Option<String>) -> ClosedSubscription {
        ClosedSubscription
    }
}

#[cfg(test)]
#[path = "lib.test.rs"]
mod tests;
