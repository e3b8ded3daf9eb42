//! Event dispatcher
//!
//! Turns transport signals into [`NotificationEvent`]s and fans them out to a
//! registry snapshot. Each callback runs inside `catch_unwind`: a panicking
//! subscriber is logged and counted, and delivery carries on with the next
//! one. Nothing here touches the connection; reconnecting after an error is
//! the lifecycle manager's job.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{DecodeError, TransportError};
use crate::event::NotificationEvent;
use crate::registry::Subscriber;
use crate::stats::ClientStats;
use crate::transport::SseFrame;

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Callbacks that returned normally
    pub delivered: usize,
    /// Callbacks that panicked
    pub failed: usize,
    /// Snapshot members skipped because they were removed mid-pass
    pub skipped: usize,
}

/// Decodes frames and delivers events
#[derive(Debug)]
pub struct Dispatcher {
    event_name: Arc<str>,
    stats: Arc<ClientStats>,
}

impl Dispatcher {
    /// Create a dispatcher for frames named `event_name`
    pub fn new(event_name: impl Into<Arc<str>>, stats: Arc<ClientStats>) -> Self {
        Self {
            event_name: event_name.into(),
            stats,
        }
    }

    /// Event name this dispatcher delivers
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Decode a frame into an event
    ///
    /// Returns `Ok(None)` for frames of other event names.
    pub fn decode(&self, frame: &SseFrame) -> Result<Option<NotificationEvent>, DecodeError> {
        if frame.event != *self.event_name {
            return Ok(None);
        }

        let payload = serde_json::from_str(&frame.data).map_err(|source| DecodeError::Json {
            event: frame.event.clone(),
            source,
        })?;

        Ok(Some(NotificationEvent::new(
            Arc::clone(&self.event_name),
            payload,
        )))
    }

    /// Handle one inbound frame
    ///
    /// Decode failures stay local: they are logged and counted and the
    /// subscribers never see them.
    pub fn on_frame(&self, frame: &SseFrame, subscribers: &[Arc<Subscriber>]) -> DeliveryReport {
        self.stats.record_frame();

        match self.decode(frame) {
            Ok(Some(event)) => self.deliver(&event, subscribers),
            Ok(None) => {
                self.stats.record_frame_ignored();
                tracing::trace!(event = %frame.event, "Ignoring frame");
                DeliveryReport::default()
            }
            Err(e) => {
                self.stats.record_decode_error();
                tracing::warn!(
                    error = %e,
                    data_len = frame.data.len(),
                    "Dropping malformed frame"
                );
                DeliveryReport::default()
            }
        }
    }

    /// Deliver the synthetic `error` event for a transport failure
    pub fn on_transport_error(
        &self,
        err: &TransportError,
        subscribers: &[Arc<Subscriber>],
    ) -> DeliveryReport {
        self.deliver(&NotificationEvent::transport_error(err), subscribers)
    }

    /// Fan an event out to every still-active subscriber, in order
    pub fn deliver(
        &self,
        event: &NotificationEvent,
        subscribers: &[Arc<Subscriber>],
    ) -> DeliveryReport {
        self.stats.record_event_dispatched();

        let mut report = DeliveryReport::default();
        for subscriber in subscribers {
            if !subscriber.is_active() {
                report.skipped += 1;
                continue;
            }

            self.stats.record_delivery();
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber.call(event))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    report.failed += 1;
                    self.stats.record_callback_panic();
                    tracing::error!(
                        subscriber = %subscriber.id(),
                        kind = event.kind(),
                        panic = panic_message(payload.as_ref()),
                        "Subscriber callback panicked"
                    );
                }
            }
        }

        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
