//! Newline-delimited JSON wire codec.
//!
//! One JSON-RPC frame per line. The decoder is incremental: a line split
//! across reads is carried until its newline arrives, empty segments are
//! discarded, and a line that fails to parse is reported without
//! terminating the stream.

use bytes::{Bytes, BytesMut};

use crate::codec::jsonrpc::Frame;
use crate::error::FrameError;

/// Maximum size of a single NDJSON line (16 MiB). Checked before JSON
/// parsing; the remainder of an oversized line is discarded up to its
/// newline.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Encode a frame as one NDJSON line.
pub fn encode(frame: &Frame) -> Bytes {
    let mut line = frame.to_json();
    line.push('\n');
    Bytes::from(line)
}

/// Incremental NDJSON decoder with an internal carry buffer.
#[derive(Debug)]
pub struct NdjsonDecoder {
    buf: BytesMut,
    limit: usize,
    discarding: bool,
}

impl NdjsonDecoder {
    /// Create a decoder with the default line size limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    /// Create a decoder with a custom line size limit.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
            discarding: false,
        }
    }

    /// Feed a chunk of bytes and collect every complete line it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Frame, FrameError>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            match self.buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    let line = self.buf.split_to(pos + 1);
                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }
                    let segment = line[..pos].trim_ascii();
                    if segment.is_empty() {
                        continue;
                    }
                    out.push(Frame::parse(segment));
                }
                None => {
                    if !self.discarding && self.buf.len() > self.limit {
                        out.push(Err(FrameError::RecordTooLarge {
                            max_bytes: self.limit,
                        }));
                        self.discarding = true;
                    }
                    if self.discarding {
                        self.buf.clear();
                    }
                    return out;
                }
            }
        }
    }

    /// Drain a trailing line that arrived without a final newline. Call once
    /// at end of stream.
    pub fn finish(&mut self) -> Option<Result<Frame, FrameError>> {
        if self.discarding {
            self.buf.clear();
            self.discarding = false;
            return None;
        }
        let rest = self.buf.split();
        let segment = rest.trim_ascii();
        if segment.is_empty() {
            None
        } else {
            Some(Frame::parse(segment))
        }
    }
}

impl Default for NdjsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_ends_with_newline() {
        let frame = Frame::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": {}})).unwrap();
        let line = encode(&frame);
        assert!(line.ends_with(b"\n"));
        assert_eq!(line.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn decode_round_trip() {
        let frame = Frame::from_value(
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "x"}}),
        )
        .unwrap();
        let mut decoder = NdjsonDecoder::new();
        let frames: Vec<_> = decoder
            .feed(&encode(&frame))
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn line_split_across_chunks() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.feed(b"{\"jsonrpc\":\"2.0\",\"id\"").is_empty());
        let frames = decoder.feed(b":1,\"result\":{}}\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_ok());
    }

    #[test]
    fn trailing_newline_yields_n_frames_not_n_plus_one() {
        let mut decoder = NdjsonDecoder::new();
        let items = decoder.feed(
            b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}\n",
        );
        assert_eq!(items.len(), 2);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn empty_segments_discarded() {
        let mut decoder = NdjsonDecoder::new();
        let items = decoder.feed(b"\n\n{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn parse_failure_does_not_terminate_stream() {
        let mut decoder = NdjsonDecoder::new();
        let items = decoder.feed(b"{broken\n{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n");
        assert_eq!(items.len(), 2);
        assert!(items[0].is_err());
        assert!(items[1].is_ok());
    }

    #[test]
    fn finish_drains_partial_tail() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.feed(b"{\"jsonrpc\":\"2.0\",\"id\":9,\"result\":{}}").is_empty());
        let tail = decoder.finish().unwrap().unwrap();
        assert_eq!(tail.id().unwrap().to_string(), "9");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn oversized_line_reported_then_resynced() {
        let mut decoder = NdjsonDecoder::with_limit(32);
        let big = vec![b'x'; 64];
        let items = decoder.feed(&big);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(FrameError::RecordTooLarge { .. })));

        let items = decoder.feed(b"xxx\n{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n");
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[test]
    fn whitespace_only_line_skipped() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.feed(b"   \r\n").is_empty());
    }
}
