//! Subscriber registry implementation

use std::collections::HashMap;
use std::sync::Arc;

use crate::event::NotificationEvent;

use super::entry::{Callback, Subscriber, SubscriberId};

/// Set of registered callbacks
///
/// Not synchronized on its own: the notification client keeps it behind the
/// same lock as the connection state, because "registry is empty" and
/// "connection is closed" have to change together.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: HashMap<SubscriberId, Arc<Subscriber>>,
    next_id: u64,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    ///
    /// Never rejects; registering the same callback twice yields two
    /// independent subscribers.
    pub fn add<F>(&mut self, callback: F) -> SubscriberId
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.add_boxed(Box::new(callback))
    }

    /// Register an already boxed callback
    pub fn add_boxed(&mut self, callback: Callback) -> SubscriberId {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);

        self.subscribers
            .insert(id, Arc::new(Subscriber::new(id, callback)));

        id
    }

    /// Remove a registration
    ///
    /// Returns `None` if it was already removed. The entry is deactivated
    /// before it is handed back, so a delivery pass holding a snapshot skips
    /// it. Callers holding a lock should drop the returned entry after
    /// releasing it: the callback may own a `Subscription`.
    pub fn remove(&mut self, id: SubscriberId) -> Option<Arc<Subscriber>> {
        let subscriber = self.subscribers.remove(&id)?;
        subscriber.deactivate();
        Some(subscriber)
    }

    /// Remove every registration, returning the deactivated entries
    pub fn clear(&mut self) -> Vec<Arc<Subscriber>> {
        self.subscribers
            .drain()
            .map(|(_, subscriber)| {
                subscriber.deactivate();
                subscriber
            })
            .collect()
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Whether the registration is present
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Copy of the current members in registration order
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        let mut members: Vec<_> = self.subscribers.values().cloned().collect();
        members.sort_unstable_by_key(|s| s.id());
        members
    }

    /// Visit a snapshot of the current members in registration order
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Subscriber),
    {
        for subscriber in self.snapshot() {
            if subscriber.is_active() {
                visit(&subscriber);
            }
        }
    }
}
