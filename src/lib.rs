//! Real-time order notifications over server-sent events
//!
//! A [`NotificationClient`] keeps one SSE connection to the notification
//! service and fans every `order-created` event out to any number of
//! subscribers:
//!
//! ```text
//!   subscribe() ──► SubscriberRegistry ◄── Subscription::cancel()
//!                          │ snapshot
//!   Transport ──frames──► Dispatcher ──► callback(&NotificationEvent) ...
//!       ▲                                     (panics isolated)
//!       └── lifecycle: open on first subscriber, close on last,
//!           reconnect after errors
//! ```
//!
//! [`ApiClient`] covers the REST side (login, orders) and shares its
//! [`SessionCredentials`] with the stream so both present the same token.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use order_notify_rs::{ApiClient, ApiConfig, ClientConfig, Credentials, NotificationClient, SessionCredentials};
//!
//! # async fn example() -> order_notify_rs::Result<()> {
//! let session = Arc::new(SessionCredentials::new());
//! let api = ApiClient::new(ApiConfig::default(), Arc::clone(&session))?;
//! api.login(&Credentials::new("alice", "secret1")).await?;
//!
//! let client = NotificationClient::new(ClientConfig::default(), session)?;
//! let _subscription = client.subscribe(|event| {
//!     if let Some(Ok(order)) = event.order_created() {
//!         println!("order #{} created", order.order_id);
//!     }
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod registry;
pub mod stats;
pub mod transport;

pub use api::{ApiClient, ApiConfig, Credentials};
pub use auth::{AuthToken, CredentialProvider, SessionCredentials, StaticCredentials};
pub use client::{ClientConfig, ConnectionState, NotificationClient, ReconnectPolicy, Subscription};
pub use error::{Error, Result, TransportError};
pub use event::{NotificationEvent, Order, OrderCreated, OrderStatus};
pub use transport::{HttpTransport, Transport};
