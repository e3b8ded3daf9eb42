//! Connection lifecycle state machine
//!
//! ```text
//!            first subscribe                   open
//!   Idle ─────────────────────► Connecting ──────────► Open
//!    ▲                            │   ▲                  │
//!    │ last cancel (any state)    │   │ timer fires,     │ error / remote close
//!    │                            │   │ subscribers > 0  │
//!    │                            ▼   │                  ▼
//!    └──────── timer fires, ──── ReconnectPending ◄──────┘
//!              no subscribers
//! ```

/// Lifecycle state of the push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No subscribers, no connection
    Idle,
    /// Connection requested, not yet open
    Connecting,
    /// Connection open, frames flowing
    Open,
    /// Connection lost, reconnect timer armed
    ReconnectPending,
}

impl ConnectionState {
    /// Whether a connection object exists in this state
    pub fn has_connection(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    /// Whether the client is trying to deliver (connected or about to be)
    pub fn is_active(self) -> bool {
        self != ConnectionState::Idle
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::ReconnectPending => "reconnect-pending",
        };
        f.write_str(name)
    }
}
