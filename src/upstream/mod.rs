//! Upstream MCP client.
//!
//! Presents a uniform connect / send / incoming-frames / close surface over
//! the two upstream transports. Dispatch is static per session: the variant
//! is chosen once at connect time from the configured output mode.
//!
//! Incoming frames arrive on a bounded channel returned by
//! [`UpstreamClient::connect`]. For the SSE variant the channel terminates
//! when the upstream stream ends or the client is closed; for the streamable
//! variant each send's reply substream drains into it. Send failures surface
//! as [`UpstreamError::Send`] carrying the diagnostic; correlation to the
//! originating request is the bridge's concern.

pub mod sse;
pub mod streamable;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::codec::jsonrpc::Frame;
use crate::config::TransportMode;
use crate::error::UpstreamError;

pub use sse::SseUpstream;
pub use streamable::StreamableUpstream;

/// Bound on the upstream connect phase, including the SSE endpoint-event
/// handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the incoming-frames channel. Senders block when the consumer
/// is slow, which pauses the upstream read.
pub(crate) const CHANNEL_CAPACITY: usize = 32;

/// A connected upstream client, one variant per transport.
#[derive(Debug)]
pub enum UpstreamClient {
    /// SSE upstream: GET stream plus message POST side channel.
    Sse(SseUpstream),
    /// Streamable-HTTP upstream: POST per send, NDJSON reply stream.
    Streamable(StreamableUpstream),
}

impl UpstreamClient {
    /// Establish the upstream connection for the given transport.
    ///
    /// The connect phase is bounded by [`CONNECT_TIMEOUT`]. For the SSE
    /// variant this covers the GET and the wait for the initial `endpoint`
    /// event; for the streamable variant connecting only records the URL.
    ///
    /// # Errors
    ///
    /// [`UpstreamError::Unavailable`] when the transport connection fails,
    /// [`UpstreamError::HandshakeFailed`] when the SSE endpoint event does
    /// not arrive in time.
    pub async fn connect(
        mode: TransportMode,
        endpoint: &reqwest::Url,
        http: &reqwest::Client,
    ) -> Result<(Self, mpsc::Receiver<Frame>), UpstreamError> {
        match mode {
            TransportMode::Sse => {
                let (client, frames) =
                    tokio::time::timeout(CONNECT_TIMEOUT, sse::connect(http, endpoint))
                        .await
                        .map_err(|_| UpstreamError::HandshakeFailed {
                            reason: format!(
                                "no endpoint event within {}s",
                                CONNECT_TIMEOUT.as_secs()
                            ),
                        })??;
                Ok((Self::Sse(client), frames))
            }
            TransportMode::Streamable => {
                let (client, frames) = streamable::connect(http, endpoint);
                Ok((Self::Streamable(client), frames))
            }
        }
    }

    /// Deliver a request or notification to the upstream. Returns once the
    /// frame has been written, not once a response arrives.
    ///
    /// # Errors
    ///
    /// [`UpstreamError::Send`] with the network or HTTP diagnostic when
    /// delivery fails. The client remains usable afterwards.
    pub async fn send(&self, frame: &Frame) -> Result<(), UpstreamError> {
        match self {
            Self::Sse(client) => client.send(frame).await,
            Self::Streamable(client) => client.send(frame).await,
        }
    }

    /// Close the connection. Idempotent; the incoming-frames channel
    /// terminates cleanly.
    pub fn close(&self) {
        match self {
            Self::Sse(client) => client.close(),
            Self::Streamable(client) => client.close(),
        }
    }
}
