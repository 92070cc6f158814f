//! Error types for the proxy.
//!
//! `FrameError` covers wire-level decoding failures: size limits, malformed
//! JSON, and frames whose shape cannot be classified. `UpstreamError` covers
//! the upstream connection lifecycle. `ProxyError` covers process-level
//! failures that terminate the run before or during serving.

use thiserror::Error;

/// Errors that can occur while decoding a wire record into a JSON-RPC frame.
///
/// Decode failures are reported per record and never terminate the stream
/// that produced them; the decoder resynchronizes at the next record
/// boundary.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A single wire record (SSE record or NDJSON line) exceeds the maximum
    /// size. Checked before JSON parsing so crafted input cannot force
    /// allocation of oversized value trees.
    #[error("record exceeds maximum size of {max_bytes} bytes")]
    RecordTooLarge {
        /// The configured maximum record size in bytes.
        max_bytes: usize,
    },

    /// The record is not valid JSON, or is not a JSON object.
    #[error("malformed JSON: {reason}")]
    MalformedJson {
        /// Human-readable description of the parse failure.
        reason: String,
    },

    /// The `id` field is present but not a string, integer, or null.
    #[error("invalid id field")]
    InvalidId,

    /// The frame has neither a `method` nor an `id`, so it is not a request,
    /// notification, or response.
    #[error("frame has neither method nor id")]
    AmbiguousShape,
}

/// Errors surfaced by the upstream client.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The transport-level connection to the upstream could not be
    /// established.
    #[error("upstream unavailable: {reason}")]
    Unavailable {
        /// Human-readable description of the connection failure.
        reason: String,
    },

    /// The connection was established but the transport handshake did not
    /// complete. For the SSE variant this means the initial `endpoint` event
    /// did not arrive in time.
    #[error("upstream handshake failed: {reason}")]
    HandshakeFailed {
        /// Human-readable description of the handshake failure.
        reason: String,
    },

    /// A frame could not be delivered to the upstream. Carries the network
    /// or HTTP diagnostic; the bridge turns this into a synthetic error
    /// response when the frame had an id.
    #[error("upstream send failed: {reason}")]
    Send {
        /// Human-readable description of the delivery failure.
        reason: String,
    },
}

/// Process-level errors that abort the run.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The CLI arguments do not resolve to a usable configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The frontend listener could not bind its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// The underlying socket error.
        source: std::io::Error,
    },

    /// An IO error in the serve loop.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
