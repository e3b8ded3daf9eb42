//! Subscription handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use crate::registry::SubscriberId;

use super::notifier::Shared;

/// Handle returned by [`NotificationClient::subscribe`]
///
/// Cancelling removes the callback from the registry; when it was the last
/// one, the connection is closed and any pending reconnect is dropped.
/// `cancel` may be called any number of times, from any thread, including
/// from inside a callback. Dropping the handle cancels it.
///
/// [`NotificationClient::subscribe`]: super::NotificationClient::subscribe
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    id: SubscriberId,
    client: Weak<Shared>,
    cancelled: AtomicBool,
}

impl Subscription {
    pub(super) fn new(id: SubscriberId, client: Weak<Shared>) -> Self {
        Self {
            id,
            client,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Registry id of this subscription
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether `cancel` has already run
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop receiving events
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        // Client already gone: nothing left to tear down
        if let Some(shared) = self.client.upgrade() {
            shared.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
