//! Error types
//!
//! `Error` covers the synchronous, caller-facing surface (configuration, REST
//! calls, shutdown). Connection problems never reach callers as `Error`; they
//! are carried as [`TransportError`] inside an `error` notification instead.

use std::time::Duration;

use thiserror::Error;

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request data failed client-side validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No tokio runtime available to drive the connection
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// The client was shut down
    #[error("Notification client has been shut down")]
    Shutdown,

    /// The server rejected the credentials (HTTP 401)
    #[error("Authentication required")]
    AuthRequired,

    /// Non-success HTTP response with the server's error message
    #[error("Request failed ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP client failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of the push connection
///
/// Cloneable so the same failure can be fanned out to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success status
    #[error("Server responded with HTTP {0}")]
    Status(u16),

    /// Reading the stream failed after it was open
    #[error("Stream read failed: {0}")]
    Stream(String),

    /// The stream went silent for longer than the idle timeout
    #[error("No data received for {0:?}")]
    IdleTimeout(Duration),

    /// The server closed the stream
    #[error("Connection closed by remote")]
    Closed,
}

impl TransportError {
    /// Whether a later reconnect attempt may succeed
    ///
    /// Every transport failure is retried; a 401/403 is reported as not
    /// recoverable so UI layers can prompt for a new login.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransportError::Status(401 | 403))
    }
}

/// Failure to turn a frame into a notification event
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame data was not valid JSON
    #[error("Malformed {event} payload: {source}")]
    Json {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// A single stream line grew past the accepted length
    #[error("Stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}
