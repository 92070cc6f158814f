//! Server-Sent Events wire codec.
//!
//! Encoding produces the three record shapes the proxy writes: `message`
//! events carrying a JSON-RPC frame, the initial `endpoint` advertisement,
//! and `:ping` comment heartbeats.
//!
//! Decoding is incremental: [`SseDecoder`] owns a carry buffer so a record
//! split across TCP reads is reassembled without losing or duplicating data.
//! Records are separated by a blank line; `event:` and `data:` fields are
//! accumulated, multi-line `data:` is joined with `\n`, and comment lines
//! are skipped. Events with names other than `message` are still yielded so
//! the caller can decide what to do with them.

use bytes::{Bytes, BytesMut};

use crate::codec::jsonrpc::Frame;
use crate::error::FrameError;

/// Maximum size of a single SSE record (16 MiB). Oversized records are
/// reported and the decoder resynchronizes at the next blank-line boundary.
pub const MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;

/// Comment heartbeat record written to keep intermediaries from idling the
/// connection.
pub const PING: &[u8] = b":ping\n\n";

/// Encode a JSON-RPC frame as an `event: message` record.
pub fn message_event(frame: &Frame) -> Bytes {
    Bytes::from(format!("event: message\ndata: {}\n\n", frame.to_json()))
}

/// Encode the endpoint advertisement, whose data is the relative path the
/// client will POST frames to.
pub fn endpoint_event(path: &str) -> Bytes {
    Bytes::from(format!("event: endpoint\ndata: {path}\n\n"))
}

/// A decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `"message"` when the record carried no `event:` field.
    pub name: String,
    /// Accumulated `data:` field value, multi-line data joined with `\n`.
    pub data: String,
}

/// Incremental SSE record decoder with an internal carry buffer.
#[derive(Debug)]
pub struct SseDecoder {
    buf: BytesMut,
    limit: usize,
    discarding: bool,
}

impl SseDecoder {
    /// Create a decoder with the default record size limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_RECORD_BYTES)
    }

    /// Create a decoder with a custom record size limit.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
            discarding: false,
        }
    }

    /// Feed a chunk of bytes and collect every complete record it finishes.
    ///
    /// Comment-only records (heartbeats) produce no event. A record that
    /// exceeds the size limit yields a [`FrameError::RecordTooLarge`] and the
    /// decoder discards input until the next blank-line boundary.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<SseEvent, FrameError>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            match record_boundary(&self.buf) {
                Some((end, next)) => {
                    let record = self.buf.split_to(next);
                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }
                    if let Some(event) = parse_record(&record[..end]) {
                        out.push(Ok(event));
                    }
                }
                None => {
                    if !self.discarding && self.buf.len() > self.limit {
                        out.push(Err(FrameError::RecordTooLarge {
                            max_bytes: self.limit,
                        }));
                        self.discarding = true;
                    }
                    if self.discarding {
                        // Keep a small tail so a boundary straddling the next
                        // chunk is still found.
                        let keep = self.buf.len().min(3);
                        let tail = self.buf.split_off(self.buf.len() - keep);
                        self.buf = tail;
                    }
                    return out;
                }
            }
        }
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the first blank-line record boundary. Returns `(record_end,
/// next_record_start)` so the terminator is consumed but excluded from the
/// record body. Handles both `\n\n` and `\n\r\n` terminators.
fn record_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match (buf.get(i + 1), buf.get(i + 2)) {
                (Some(b'\n'), _) => return Some((i, i + 2)),
                (Some(b'\r'), Some(b'\n')) => return Some((i, i + 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Parse one record body into an event, or `None` for comment-only records
/// and records with no data.
fn parse_record(record: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(record);
    let mut name: Option<String> = None;
    let mut data: Vec<String> = Vec::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => name = Some(value.to_string()),
            "data" => data.push(value.to_string()),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        name: name.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}
