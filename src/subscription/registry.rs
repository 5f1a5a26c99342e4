use crate::subscription::subscriber::{Subscriber, SubscriberId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Process-wide set of live subscribers
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Subscriber>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    pub fn add(&self, subscriber: Subscriber) {
        debug!(subscriber_id = %subscriber.id(), "Subscriber registered");
        self.subscribers.insert(subscriber.id(), subscriber);
    }

    /// Remove a subscriber. Removing one that is absent is a no-op.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber_id = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Call `f` for every subscriber registered at call time.
    ///
    /// Iterates a copy of the member handles, so adds and removes during the
    /// walk are safe; a subscriber removed mid-walk may still be visited and
    /// its enqueue silently dropped.
    pub fn for_each(&self, mut f: impl FnMut(&Subscriber)) {
        let members: Vec<Subscriber> = self
            .subscribers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for subscriber in &members {
            f(subscriber);
        }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry membership tied to a scope: the entry is removed on drop
pub struct Registration {
    registry: Arc<SubscriberRegistry>,
    id: SubscriberId,
}

impl Registration {
    /// Add `subscriber` and return the guard that removes it again
    pub fn new(registry: Arc<SubscriberRegistry>, subscriber: Subscriber) -> Self {
        let id = subscriber.id();
        registry.add(subscriber);
        Self { registry, id }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
