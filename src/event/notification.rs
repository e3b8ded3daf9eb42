//! The record delivered to subscribers

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::TransportError;

use super::order::OrderCreated;

/// Event name the server uses for new orders
pub const ORDER_CREATED_KIND: &str = "order-created";

/// Kind of the synthetic event emitted on transport failure
pub const ERROR_KIND: &str = "error";

/// A single notification, `{ kind, payload }`
///
/// Cheap to clone: the kind is shared and the payload is only cloned when a
/// channel subscriber takes ownership.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    /// Event name as declared on the stream, or `"error"`
    pub kind: Arc<str>,
    /// Decoded JSON payload
    pub payload: Value,
}

impl NotificationEvent {
    /// Create an event of the given kind
    pub fn new(kind: impl Into<Arc<str>>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Create the synthetic error event for a transport failure
    pub fn transport_error(err: &TransportError) -> Self {
        Self::new(
            ERROR_KIND,
            json!({
                "message": err.to_string(),
                "recoverable": err.is_recoverable(),
            }),
        )
    }

    /// Event kind as a string slice
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether this is a synthetic transport error event
    pub fn is_error(&self) -> bool {
        &*self.kind == ERROR_KIND
    }

    /// Whether this is an `order-created` event
    pub fn is_order_created(&self) -> bool {
        &*self.kind == ORDER_CREATED_KIND
    }

    /// Typed view of an `order-created` payload
    ///
    /// Returns `None` for other kinds.
    pub fn order_created(&self) -> Option<serde_json::Result<OrderCreated>> {
        if !self.is_order_created() {
            return None;
        }
        Some(OrderCreated::deserialize_from(&self.payload))
    }

    /// Message carried by an error event
    pub fn error_message(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        self.payload.get("message").and_then(Value::as_str)
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.payload)
    }
}
