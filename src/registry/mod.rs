//! Subscriber registry for notification fan-out
//!
//! The registry holds every callback interested in notifications. Dispatch
//! never iterates the live map; it takes a registration-ordered snapshot and
//! checks each entry's `active` flag right before calling it.
//!
//! # Architecture
//!
//! ```text
//!                    SubscriberRegistry
//!            ┌──────────────────────────────┐
//!            │ subscribers: HashMap<Id,     │
//!            │   Arc<Subscriber {           │
//!            │     callback, active,        │
//!            │   }>                         │
//!            │ >                            │
//!            └──────────────┬───────────────┘
//!                           │ snapshot() (sorted by id)
//!                           ▼
//!         [sub-1] ──► [sub-2] ──► [sub-3]      Dispatcher::deliver()
//!            │           │ (removed: skipped)     │
//!            └──► callback(&event) ◄──────────────┘
//! ```
//!
//! Removal is O(1). Snapshots cost O(n log n) per dispatch, which is paid on
//! the delivery path rather than on subscribe/cancel.

pub mod entry;
pub mod store;

pub use entry::{Callback, Subscriber, SubscriberId};
pub use store::SubscriberRegistry;
