//! Notification client
//!
//! Provides the subscriber-facing side of the notification stream:
//! - Lazily opened, shared SSE connection
//! - Callback and channel subscriptions with idempotent cancel
//! - Automatic reconnect after transport failures

pub mod config;
pub mod notifier;
pub mod state;
pub mod subscription;

pub use config::{ClientConfig, ReconnectPolicy};
pub use notifier::NotificationClient;
pub use state::ConnectionState;
pub use subscription::Subscription;
