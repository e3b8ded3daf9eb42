//! Statistics for the notification client

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated lock-free from any task
#[derive(Debug, Default)]
pub struct ClientStats {
    connect_attempts: AtomicU64,
    connections_opened: AtomicU64,
    reconnects_scheduled: AtomicU64,
    transport_errors: AtomicU64,
    frames_received: AtomicU64,
    frames_ignored: AtomicU64,
    decode_errors: AtomicU64,
    events_dispatched: AtomicU64,
    deliveries: AtomicU64,
    callback_panics: AtomicU64,
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $record(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl ClientStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        record_connect_attempt => connect_attempts,
        record_connection_opened => connections_opened,
        record_reconnect_scheduled => reconnects_scheduled,
        record_transport_error => transport_errors,
        record_frame => frames_received,
        record_frame_ignored => frames_ignored,
        record_decode_error => decode_errors,
        record_event_dispatched => events_dispatched,
        record_delivery => deliveries,
        record_callback_panic => callback_panics,
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_ignored: self.frames_ignored.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of client counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connection attempts started (initial and reconnects)
    pub connect_attempts: u64,
    /// Attempts that reached the open state
    pub connections_opened: u64,
    /// Reconnect timers armed
    pub reconnects_scheduled: u64,
    /// Transport failures reported by current connections
    pub transport_errors: u64,
    /// Frames received on current connections
    pub frames_received: u64,
    /// Frames skipped because of their event name
    pub frames_ignored: u64,
    /// Frames whose payload failed to decode
    pub decode_errors: u64,
    /// Events fanned out (including synthetic error events)
    pub events_dispatched: u64,
    /// Individual callback invocations
    pub deliveries: u64,
    /// Callback invocations that panicked
    pub callback_panics: u64,
}
