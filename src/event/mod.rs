//! Notification event types
//!
//! A [`NotificationEvent`] is produced for every decoded frame (and for every
//! transport failure) and handed to each subscriber by reference. Events are
//! transient; nothing here is stored after the dispatch pass.

pub mod notification;
pub mod order;

pub use notification::{NotificationEvent, ERROR_KIND, ORDER_CREATED_KIND};
pub use order::{Order, OrderCreated, OrderStatus};
