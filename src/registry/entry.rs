//! Subscriber entries
//!
//! Each registration is one [`Subscriber`]: an identity, a callback and an
//! `active` flag. Dispatch works on snapshots of `Arc<Subscriber>`, so the
//! flag is what makes a removal visible to a delivery pass already running.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::NotificationEvent;

/// Callback invoked for every notification
pub type Callback = Box<dyn Fn(&NotificationEvent) + Send + Sync + 'static>;

/// Identity of one registration
///
/// Allocated from a monotonically increasing counter, so ordering by ID is
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A registered callback
pub struct Subscriber {
    id: SubscriberId,
    callback: Callback,
    active: AtomicBool,
}

impl Subscriber {
    pub(super) fn new(id: SubscriberId, callback: Callback) -> Self {
        Self {
            id,
            callback,
            active: AtomicBool::new(true),
        }
    }

    /// Registration identity
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the registration is still live
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(super) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Invoke the callback directly
    ///
    /// Panics propagate; the dispatcher is responsible for isolation.
    pub fn call(&self, event: &NotificationEvent) {
        (self.callback)(event)
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
