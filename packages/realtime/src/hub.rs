//! In-process broadcaster fanning events out to live subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use sampler_core::HubEvent;
use ulid::Ulid;

/// Identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub Ulid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something the hub can push events to.
///
/// `send_event` must never block: implementations enqueue into their own
/// bounded buffer and report whether the event was accepted.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    fn send_event(&self, event: &HubEvent) -> bool;
}

/// Registry of live subscribers.
///
/// Construct one per process (or per test) and share it behind an `Arc`.
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<dyn Subscriber>>> {
        // A panicking subscriber must not take the whole hub down with it.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a subscriber. Registering the same id again replaces the entry.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) {
        let id = subscriber.id();
        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, subscriber);
            subscribers.len()
        };
        tracing::debug!(subscriber = %id, clients = count, "Subscriber registered");
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unregister(&self, id: SubscriberId) {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "Subscriber unregistered");
        }
    }

    /// Offer `event` to every subscriber and return how many accepted it.
    ///
    /// Never blocks and never fails; a subscriber whose buffer is full simply
    /// misses the event.
    pub fn broadcast(&self, event: &HubEvent) -> usize {
        let targets: Vec<Arc<dyn Subscriber>> = self.lock().values().cloned().collect();

        let mut delivered = 0;
        for subscriber in targets {
            if subscriber.send_event(event) {
                delivered += 1;
            } else {
                tracing::debug!(
                    subscriber = %subscriber.id(),
                    event = event.kind(),
                    "Dropped event for slow subscriber"
                );
            }
        }
        delivered
    }

    /// Number of registered subscribers.
    pub fn client_count(&self) -> usize {
        self.lock().len()
    }
}
