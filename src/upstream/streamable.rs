//! Streamable-HTTP upstream client.
//!
//! Connecting records the URL. Each `send` opens a POST whose body is the
//! single frame; the response body is an NDJSON stream whose frames are
//! enqueued into the incoming channel. When a response body ends the
//! per-request substream ends, and the client remains usable for the next
//! send.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::jsonrpc::Frame;
use crate::codec::ndjson::NdjsonDecoder;
use crate::error::UpstreamError;

use super::CHANNEL_CAPACITY;

/// A streamable-HTTP upstream.
#[derive(Debug)]
pub struct StreamableUpstream {
    http: reqwest::Client,
    url: reqwest::Url,
    frames: mpsc::Sender<Frame>,
    cancel: CancellationToken,
}

/// Record the endpoint URL and hand back the incoming-frames channel.
pub(super) fn connect(
    http: &reqwest::Client,
    endpoint: &reqwest::Url,
) -> (StreamableUpstream, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        StreamableUpstream {
            http: http.clone(),
            url: endpoint.clone(),
            frames: tx,
            cancel: CancellationToken::new(),
        },
        rx,
    )
}

impl StreamableUpstream {
    /// POST one frame and pipe the NDJSON reply stream into the incoming
    /// channel.
    pub(super) async fn send(&self, frame: &Frame) -> Result<(), UpstreamError> {
        let result = self.http.post(self.url.clone()).json(frame.value()).send().await;
        match result {
            Ok(response) if response.status().is_success() => {
                let stream = Box::pin(response.bytes_stream());
                tokio::spawn(read_reply(stream, self.frames.clone(), self.cancel.clone()));
                Ok(())
            }
            Ok(response) => Err(UpstreamError::Send {
                reason: format!("upstream returned HTTP {}", response.status()),
            }),
            Err(e) => Err(UpstreamError::Send {
                reason: e.to_string(),
            }),
        }
    }

    /// Stop any in-flight reply readers. Idempotent.
    pub(super) fn close(&self) {
        self.cancel.cancel();
    }
}

/// Decode one POST's reply stream until the body ends or the client closes.
async fn read_reply(
    mut stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
    frames: mpsc::Sender<Frame>,
    cancel: CancellationToken,
) {
    let mut decoder = NdjsonDecoder::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    for item in decoder.feed(&chunk) {
                        match item {
                            Ok(frame) => {
                                if frames.send(frame).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "upstream NDJSON line error"),
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "upstream reply stream error");
                    return;
                }
                None => break,
            }
        }
    }

    // A reply body may end without a final newline.
    if let Some(item) = decoder.finish() {
        match item {
            Ok(frame) => {
                let _ = frames.send(frame).await;
            }
            Err(e) => tracing::warn!(error = %e, "upstream NDJSON tail error"),
        }
    }
}
