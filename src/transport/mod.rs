//! Push transport abstraction
//!
//! The client never touches the wire itself. It asks a [`Transport`] to open
//! a connection and receives signals back through [`TransportEvents`]:
//!
//! ```text
//!   NotificationClient                      Transport task
//!   ──────────────────                      ──────────────
//!   connect(request, events) ──────────────► spawn
//!                                             │ opened()
//!   on_open      ◄────────────────────────────┤
//!                                             │ frame(SseFrame) *
//!   on_frame     ◄────────────────────────────┤
//!                                             │ error(TransportError)
//!   on_error     ◄────────────────────────────┘
//! ```
//!
//! Every attempt is stamped with a [`ConnectionId`]. Signals from an attempt
//! the client has already abandoned are discarded on arrival, so a slow task
//! that outlives its connection can never produce duplicate deliveries.

pub mod http;
pub mod sse;

use std::sync::Weak;

use reqwest::Url;

use crate::auth::AuthToken;
use crate::error::TransportError;

pub use http::HttpTransport;
pub use sse::{SseDecoder, SseFrame};

/// Identifier of one connection attempt (monotonically increasing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters for one connection attempt
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Attempt identifier
    pub id: ConnectionId,
    /// Stream endpoint
    pub endpoint: Url,
    /// Credential captured when the attempt started
    pub auth: Option<AuthToken>,
}

/// Opens push connections
///
/// `connect` must return promptly: the actual I/O belongs on a spawned task.
/// It must not invoke `events` before returning.
pub trait Transport: Send + Sync + 'static {
    /// Start a connection attempt
    fn connect(&self, request: ConnectRequest, events: TransportEvents) -> Box<dyn Connection>;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn connect(&self, request: ConnectRequest, events: TransportEvents) -> Box<dyn Connection> {
        (**self).connect(request, events)
    }
}

/// A live (or opening) connection
pub trait Connection: Send {
    /// Close the connection. Must be idempotent.
    fn close(&mut self);
}

/// Receiver side of transport signals
pub(crate) trait TransportListener: Send + Sync {
    fn on_open(&self, id: ConnectionId);
    fn on_frame(&self, id: ConnectionId, frame: SseFrame);
    fn on_error(&self, id: ConnectionId, err: TransportError);
}

/// Signal channel handed to a transport for one connection attempt
///
/// Holds only a weak reference to the client; signals sent after the client
/// is gone are dropped.
#[derive(Clone)]
pub struct TransportEvents {
    id: ConnectionId,
    listener: Weak<dyn TransportListener>,
}

impl TransportEvents {
    pub(crate) fn new(id: ConnectionId, listener: Weak<dyn TransportListener>) -> Self {
        Self { id, listener }
    }

    /// Attempt this channel belongs to
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the client is still alive
    pub fn is_attached(&self) -> bool {
        self.listener.strong_count() > 0
    }

    /// The connection is open
    pub fn opened(&self) {
        if let Some(listener) = self.listener.upgrade() {
            listener.on_open(self.id);
        }
    }

    /// A frame arrived
    pub fn frame(&self, frame: SseFrame) {
        if let Some(listener) = self.listener.upgrade() {
            listener.on_frame(self.id, frame);
        }
    }

    /// The connection failed or was closed by the remote end
    pub fn error(&self, err: TransportError) {
        if let Some(listener) = self.listener.upgrade() {
            listener.on_error(self.id, err);
        }
    }
}

impl std::fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEvents")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}
