//! SSE over a streaming HTTP response
//!
//! Each attempt spawns one task that issues the `GET`, reports `opened()` on
//! a 2xx response, then feeds body chunks through an [`SseDecoder`] and
//! forwards every complete frame. Any failure, including a clean end of
//! body or a body that stays silent past the idle timeout, ends the task
//! with exactly one `error()` signal.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{Error, Result, TransportError};

use super::sse::SseDecoder;

/// Default silence allowed on an open stream before it is dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);
use super::{ConnectRequest, Connection, Transport, TransportEvents};

/// `reqwest`-backed SSE transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: Handle,
    idle_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with a default HTTP client
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    /// Create a transport whose HTTP client gives up connecting after `timeout`
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Self::with_client(client)
    }

    /// Create a transport around an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::NoRuntime(e.to_string()))?;
        Ok(Self {
            client,
            runtime,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Drop a stream that delivers no bytes for `timeout`
    ///
    /// Server keep-alive comments count as data, so this should be longer
    /// than the server's keep-alive interval.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

impl Transport for HttpTransport {
    fn connect(&self, request: ConnectRequest, events: TransportEvents) -> Box<dyn Connection> {
        let client = self.client.clone();
        let idle_timeout = self.idle_timeout;
        let task = self
            .runtime
            .spawn(async move { run_stream(client, idle_timeout, request, events).await });

        Box::new(HttpConnection { task })
    }
}

async fn run_stream(
    client: reqwest::Client,
    idle_timeout: Duration,
    request: ConnectRequest,
    events: TransportEvents,
) {
    let id = request.id;

    let mut builder = client
        .get(request.endpoint.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(ref token) = request.auth {
        builder = builder.bearer_auth(token.expose());
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(connection_id = %id, error = %e, "SSE connect failed");
            events.error(TransportError::Connect(e.to_string()));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(connection_id = %id, status = status.as_u16(), "SSE endpoint rejected");
        events.error(TransportError::Status(status.as_u16()));
        return;
    }

    events.opened();

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    loop {
        let chunk = match tokio::time::timeout(idle_timeout, body.next()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(connection_id = %id, timeout = ?idle_timeout, "SSE stream idle");
                events.error(TransportError::IdleTimeout(idle_timeout));
                return;
            }
        };

        match chunk {
            Ok(bytes) => {
                if let Err(e) = decoder.feed(&bytes) {
                    tracing::warn!(connection_id = %id, error = %e, "SSE stream rejected");
                    events.error(TransportError::Stream(e.to_string()));
                    return;
                }
                while let Some(frame) = decoder.next_frame() {
                    events.frame(frame);
                }
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "SSE stream read failed");
                events.error(TransportError::Stream(e.to_string()));
                return;
            }
        }

        if !events.is_attached() {
            return;
        }
    }

    tracing::debug!(connection_id = %id, "SSE stream ended");
    events.error(TransportError::Closed);
}

/// Handle to the streaming task; closing aborts it
struct HttpConnection {
    task: JoinHandle<()>,
}

impl Connection for HttpConnection {
    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}
