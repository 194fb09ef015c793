use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, Notify};
use tracing::debug;
use uuid::Uuid;

use crate::model::TrackingEvent;

pub type SubscriberId = Uuid;

/// Fan-out of tracking events to connected consumers.
///
/// Each consumer gets a bounded queue; publishing never waits on a slow
/// consumer. When a queue is full the newest event replaces the oldest
/// queued event of the same kind for the same vehicle, or failing that the
/// oldest queued event overall.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    capacity: usize,
    subscribers: DashMap<SubscriberId, Arc<Subscriber>>,
    by_vehicle: DashMap<String, HashSet<SubscriberId>>,
    all: DashSet<SubscriberId>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            subscribers: DashMap::new(),
            by_vehicle: DashMap::new(),
            all: DashSet::new(),
        }
    }

    /// Register a consumer connection; events arrive through the handle.
    #[must_use]
    pub fn register(&self) -> SubscriberHandle {
        let subscriber = Arc::new(Subscriber {
            id: Uuid::new_v4(),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        self.subscribers.insert(subscriber.id, Arc::clone(&subscriber));
        SubscriberHandle { subscriber }
    }

    /// Add a single-vehicle scope. Unknown subscriber ids are ignored.
    pub fn subscribe(&self, subscriber_id: SubscriberId, vehicle_id: &str) {
        if !self.subscribers.contains_key(&subscriber_id) {
            return;
        }
        self.by_vehicle.entry(vehicle_id.to_string()).or_default().insert(subscriber_id);
    }

    /// Add the all-vehicles scope. Unknown subscriber ids are ignored.
    pub fn subscribe_all(&self, subscriber_id: SubscriberId) {
        if !self.subscribers.contains_key(&subscriber_id) {
            return;
        }
        self.all.insert(subscriber_id);
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId, vehicle_id: &str) {
        if let Some(mut scoped) = self.by_vehicle.get_mut(vehicle_id) {
            scoped.remove(&subscriber_id);
            if scoped.is_empty() {
                drop(scoped);
                self.by_vehicle.remove_if(vehicle_id, |_, set| set.is_empty());
            }
        }
    }

    pub fn unsubscribe_all(&self, subscriber_id: SubscriberId) {
        self.all.remove(&subscriber_id);
        self.by_vehicle.retain(|_, scoped| {
            scoped.remove(&subscriber_id);
            !scoped.is_empty()
        });
    }

    /// Remove the connection and every scope it held.
    pub fn disconnect(&self, subscriber_id: SubscriberId) {
        self.unsubscribe_all(subscriber_id);
        if let Some((_, subscriber)) = self.subscribers.remove(&subscriber_id) {
            subscriber.close();
        }
    }

    /// Deliver the event to every subscriber scoped to its vehicle plus the
    /// all-vehicles subscribers. Never blocks on a full queue.
    pub async fn publish(&self, event: &TrackingEvent) {
        let mut targets: HashSet<SubscriberId> =
            self.all.iter().map(|entry| *entry.key()).collect();
        if let Some(scoped) = self.by_vehicle.get(event.vehicle_id()) {
            targets.extend(scoped.iter().copied());
        }

        for subscriber_id in targets {
            if let Some(subscriber) = self.subscriber(subscriber_id) {
                subscriber.push(self.capacity, event.clone()).await;
            }
        }
    }

    /// Deliver the event to one specific connection, bypassing scopes.
    /// Returns false when the connection is gone.
    pub async fn send_to(&self, subscriber_id: SubscriberId, event: TrackingEvent) -> bool {
        match self.subscriber(subscriber_id) {
            Some(subscriber) => {
                subscriber.push(self.capacity, event).await;
                true
            }
            None => false,
        }
    }

    fn subscriber(&self, subscriber_id: SubscriberId) -> Option<Arc<Subscriber>> {
        self.subscribers.get(&subscriber_id).map(|entry| Arc::clone(entry.value()))
    }
}

/// Consuming side of one registered connection.
pub struct SubscriberHandle {
    subscriber: Arc<Subscriber>,
}

impl SubscriberHandle {
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.subscriber.id
    }

    /// Next queued event, waiting if the queue is empty. Returns `None`
    /// once the connection has been disconnected.
    pub async fn recv(&self) -> Option<TrackingEvent> {
        loop {
            if self.subscriber.closed.load(Ordering::SeqCst) {
                return None;
            }
            {
                let mut queue = self.subscriber.queue.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Some(event);
                }
            }
            self.subscriber.notify.notified().await;
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    queue: Mutex<VecDeque<TrackingEvent>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Subscriber {
    async fn push(&self, capacity: usize, event: TrackingEvent) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= capacity {
            let replaced = queue.iter().position(|queued| {
                queued.kind() == event.kind() && queued.vehicle_id() == event.vehicle_id()
            });
            match replaced {
                Some(index) => {
                    queue.remove(index);
                    debug!(
                        subscriber_id = %self.id,
                        vehicle_id = event.vehicle_id(),
                        kind = ?event.kind(),
                        "queue full, replaced queued event of same kind"
                    );
                }
                None => {
                    queue.pop_front();
                    debug!(
                        subscriber_id = %self.id,
                        vehicle_id = event.vehicle_id(),
                        "queue full, dropped oldest queued event"
                    );
                }
            }
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}
