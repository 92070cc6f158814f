//! Wire codecs for the two MCP transports.
//!
//! [`jsonrpc`] is the transport-agnostic frame model; [`sse`] and [`ndjson`]
//! translate frames to and from their wire encodings. All decoders are
//! incremental and own carry buffers, so chunk boundaries inside a record
//! never lose or duplicate data.

pub mod jsonrpc;
pub mod ndjson;
pub mod sse;
