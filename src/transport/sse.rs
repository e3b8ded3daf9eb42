//! Incremental server-sent events decoder
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::feed`] buffers them and
//! [`SseDecoder::next_frame`] yields each complete event once its
//! terminating blank line has been seen.
//!
//! ```text
//! event: order-created      ─┐
//! id: 17                     │  one frame
//! data: {"orderId":17}       │
//!                           ─┘  (blank line dispatches)
//! ```

use bytes::{Buf, BytesMut};

use crate::error::DecodeError;

/// Event name used when a frame carries no `event:` field
pub const DEFAULT_EVENT: &str = "message";

/// Longest line accepted before the stream is considered broken
pub const DEFAULT_MAX_LINE_LEN: usize = 256 * 1024;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name (`message` when absent)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event ID seen on the stream
    pub id: Option<String>,
    /// Reconnection time requested by the server, in milliseconds
    pub retry: Option<u64>,
}

impl SseFrame {
    /// Create a frame with the given event name and data
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }
}

/// Stateful SSE line parser
#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already searched for a terminator
    scanned: usize,
    /// Length of the unterminated line at the end of the fed bytes
    pending_line: usize,
    max_line_len: usize,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
    retry: Option<u64>,
    started: bool,
}

impl SseDecoder {
    /// Create a decoder with an 8KB initial buffer
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            scanned: 0,
            pending_line: 0,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            event: None,
            data: String::new(),
            has_data: false,
            last_id: None,
            retry: None,
            started: false,
        }
    }

    /// Set the longest accepted line
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Append a chunk of raw stream bytes
    ///
    /// Fails once an unterminated line grows past the line limit; the
    /// decoder should be discarded along with its connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), DecodeError> {
        match chunk.iter().rposition(|&b| b == b'\n' || b == b'\r') {
            Some(pos) => self.pending_line = chunk.len() - pos - 1,
            None => self.pending_line += chunk.len(),
        }
        if self.pending_line > self.max_line_len {
            return Err(DecodeError::LineTooLong {
                limit: self.max_line_len,
            });
        }

        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Number of buffered bytes not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<SseFrame> {
        if !self.started {
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return None;
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.advance(BOM.len());
            }
            self.started = true;
        }

        while let Some(line) = self.next_line() {
            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    return Some(frame);
                }
                continue;
            }
            self.process_line(&line);
        }

        None
    }

    /// Split one line off the buffer, handling `\n`, `\r\n` and lone `\r`
    fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        else {
            self.scanned = self.buffer.len();
            return None;
        };
        let pos = self.scanned + offset;

        let terminator_len = if self.buffer[pos] == b'\r' {
            match self.buffer.get(pos + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                // Could be the first half of a split \r\n
                None => {
                    self.scanned = pos;
                    return None;
                }
            }
        } else {
            1
        };

        let line = self.buffer.split_to(pos);
        self.buffer.advance(terminator_len);
        self.scanned = 0;

        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            other => {
                tracing::trace!(field = other, "Ignoring unknown SSE field");
            }
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();

        if !self.has_data {
            return None;
        }

        self.has_data = false;
        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
            retry: self.retry,
        })
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}
