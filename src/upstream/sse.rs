//! SSE upstream client.
//!
//! Opens a GET against the upstream SSE endpoint, waits for the initial
//! `endpoint` event to learn the message-post path (resolved relative to the
//! SSE URL), then decodes `message` events into the incoming-frames channel.
//! `send` POSTs the frame as JSON to the learned path.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::jsonrpc::Frame;
use crate::codec::sse::{SseDecoder, SseEvent};
use crate::error::UpstreamError;

use super::CHANNEL_CAPACITY;

/// A connected SSE upstream.
#[derive(Debug)]
pub struct SseUpstream {
    http: reqwest::Client,
    post_url: reqwest::Url,
    cancel: CancellationToken,
}

/// Open the SSE stream and complete the endpoint handshake. The caller
/// bounds the whole call with the connect timeout.
pub(super) async fn connect(
    http: &reqwest::Client,
    endpoint: &reqwest::Url,
) -> Result<(SseUpstream, mpsc::Receiver<Frame>), UpstreamError> {
    let response = http
        .get(endpoint.clone())
        .header(header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| UpstreamError::Unavailable {
            reason: e.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(UpstreamError::Unavailable {
            reason: format!("upstream returned HTTP {}", response.status()),
        });
    }

    let mut stream = Box::pin(response.bytes_stream());
    let mut decoder = SseDecoder::new();
    // Frames decoded before the handshake completes are replayed into the
    // channel once the reader starts.
    let mut early: Vec<Frame> = Vec::new();
    let mut advertised: Option<String> = None;

    let post_path = loop {
        if let Some(path) = advertised.take() {
            break path;
        }
        let chunk = match stream.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                return Err(UpstreamError::HandshakeFailed {
                    reason: e.to_string(),
                });
            }
            None => {
                return Err(UpstreamError::HandshakeFailed {
                    reason: "stream ended before endpoint event".to_string(),
                });
            }
        };
        for item in decoder.feed(&chunk) {
            match item {
                Ok(event) if event.name == "endpoint" && advertised.is_none() => {
                    advertised = Some(event.data);
                }
                Ok(event) => {
                    if let Some(frame) = frame_from_event(event) {
                        early.push(frame);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "upstream SSE record error during handshake");
                }
            }
        }
    };

    let post_url = endpoint
        .join(&post_path)
        .map_err(|e| UpstreamError::HandshakeFailed {
            reason: format!("invalid endpoint path '{post_path}': {e}"),
        })?;
    tracing::debug!(post_url = %post_url, "upstream SSE handshake complete");

    // The reader task owns the only sender, so the incoming channel
    // terminates exactly when the stream ends or the client is closed.
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    tokio::spawn(read_loop(stream, decoder, early, tx, cancel.clone()));

    Ok((
        SseUpstream {
            http: http.clone(),
            post_url,
            cancel,
        },
        rx,
    ))
}

impl SseUpstream {
    /// POST one frame to the learned message path.
    pub(super) async fn send(&self, frame: &Frame) -> Result<(), UpstreamError> {
        let result = self
            .http
            .post(self.post_url.clone())
            .json(frame.value())
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(UpstreamError::Send {
                reason: format!("upstream returned HTTP {}", response.status()),
            }),
            Err(e) => Err(UpstreamError::Send {
                reason: e.to_string(),
            }),
        }
    }

    /// Stop the reader task. Idempotent.
    pub(super) fn close(&self) {
        self.cancel.cancel();
    }
}

/// Decode the GET stream into frames until it ends, errors, or the client is
/// closed. Dropping the channel sender terminates the incoming sequence.
async fn read_loop(
    mut stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
    mut decoder: SseDecoder,
    early: Vec<Frame>,
    frames: mpsc::Sender<Frame>,
    cancel: CancellationToken,
) {
    for frame in early {
        if frames.send(frame).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    for item in decoder.feed(&chunk) {
                        match item {
                            Ok(event) => {
                                if let Some(frame) = frame_from_event(event) {
                                    if frames.send(frame).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "upstream SSE record error"),
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "upstream SSE stream error");
                    break;
                }
                None => {
                    tracing::debug!("upstream SSE stream ended");
                    break;
                }
            }
        }
    }
}

/// Extract a JSON-RPC frame from a decoded event. Only `message` events
/// carry frames; anything else is logged and dropped.
fn frame_from_event(event: SseEvent) -> Option<Frame> {
    match event.name.as_str() {
        "message" => match Frame::parse(event.data.as_bytes()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparseable upstream frame");
                None
            }
        },
        "endpoint" => {
            tracing::debug!("ignoring repeated endpoint event");
            None
        }
        name => {
            tracing::debug!(event = name, "ignoring unrecognized SSE event");
            None
        }
    }
}
