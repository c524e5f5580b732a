/*!
 * Event Bus
 * Observer fan-out with explicit, revocable subscriptions
 */

use super::events::{LifecycleEvent, Topic};
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Observer callback type
pub type ObserverFn = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(ObserverFn),
    Channel(flume::Sender<LifecycleEvent>),
}

#[derive(Clone)]
struct Subscriber {
    topic: Option<Topic>,
    sink: Sink,
}

impl Subscriber {
    #[inline]
    fn wants(&self, topic: Topic) -> bool {
        self.topic.map_or(true, |t| t == topic)
    }
}

struct BusInner {
    subscribers: RwLock<HashMap<u64, Subscriber, RandomState>>,
    next_id: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
}

/// Event bus statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub events_published: u64,
    pub events_delivered: u64,
    pub active_subscribers: usize,
}

/// Multi-subscriber event fan-out
///
/// Cloning the bus yields another handle to the same subscriber list.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(HashMap::with_hasher(RandomState::new())),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe a callback to every event
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.attach(None, Sink::Callback(Arc::new(observer)))
    }

    /// Subscribe a callback to a single topic
    pub fn subscribe_topic<F>(&self, topic: Topic, observer: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.attach(Some(topic), Sink::Callback(Arc::new(observer)))
    }

    /// Subscribe through a channel, optionally filtered by topic
    pub fn subscribe_channel(
        &self,
        topic: Option<Topic>,
    ) -> (Subscription, flume::Receiver<LifecycleEvent>) {
        let (tx, rx) = flume::unbounded();
        (self.attach(topic, Sink::Channel(tx)), rx)
    }

    fn attach(&self, topic: Option<Topic>, sink: Sink) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .insert(id, Subscriber { topic, sink });
        debug!(subscription = id, ?topic, "event subscriber attached");

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every interested subscriber
    ///
    /// The subscriber list is snapshotted before delivery, so observers may
    /// subscribe or revoke from inside their callback.
    pub fn emit(&self, event: LifecycleEvent) {
        let topic = event.topic();
        let targets: Vec<(u64, Subscriber)> = self
            .inner
            .subscribers
            .read()
            .iter()
            .filter(|(_, s)| s.wants(topic))
            .map(|(id, s)| (*id, s.clone()))
            .collect();

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        trace!(?topic, subscribers = targets.len(), "emitting event");

        let mut disconnected = Vec::new();
        for (id, subscriber) in targets {
            match subscriber.sink {
                Sink::Callback(f) => {
                    f(&event);
                    self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_ok() {
                        self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                    } else {
                        disconnected.push(id);
                    }
                }
            }
        }

        if !disconnected.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in disconnected {
                debug!(subscription = id, "dropping disconnected event subscriber");
                subscribers.remove(&id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            events_published: self.inner.published.load(Ordering::Relaxed),
            events_delivered: self.inner.delivered.load(Ordering::Relaxed),
            active_subscribers: self.subscriber_count(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle owning one subscription; revoked explicitly or on drop
#[must_use = "dropping a Subscription revokes it"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Revoke now; returns whether the subscription was still attached
    pub fn revoke(self) -> bool {
        self.detach()
    }

    fn detach(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.subscribers.write().remove(&self.id).is_some(),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
