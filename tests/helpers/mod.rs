//! Shared test fixtures: the mock upstream and a proxy launcher.

#![allow(dead_code)]

pub mod mock_upstream;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::Bytes;
use clap::Parser;
use futures_util::{Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mcp_bridge::codec::sse::{SseDecoder, SseEvent};
use mcp_bridge::{Args, ProxyConfig, ProxyError, TransportMode};

/// A proxy instance bound to an ephemeral port.
pub struct ProxyHandle {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<Result<(), ProxyError>>,
}

/// Start the proxy with the given modes and upstream endpoint.
pub async fn start_proxy(
    input_mode: TransportMode,
    output_mode: TransportMode,
    endpoint: &str,
) -> ProxyHandle {
    let args = Args::try_parse_from([
        "mcp-bridge",
        "--input-mode",
        &input_mode.to_string(),
        "--output-mode",
        &output_mode.to_string(),
        "--endpoint",
        endpoint,
    ])
    .unwrap();
    let config = ProxyConfig::from_args(args).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(mcp_bridge::run_with_listener(
        config,
        listener,
        shutdown.clone(),
    ));

    ProxyHandle {
        addr,
        shutdown,
        task,
    }
}

/// Minimal SSE client over a reqwest byte stream.
pub struct SseClient {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
}

impl SseClient {
    /// Open the stream and assert the event-stream content type.
    pub async fn connect(url: &str) -> Self {
        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        assert!(
            content_type.starts_with("text/event-stream"),
            "unexpected content type: {content_type}"
        );

        Self {
            stream: Box::pin(response.bytes_stream()),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// Next decoded event, or `None` at end of stream. Heartbeat comments
    /// never surface here; the decoder skips them.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let chunk = self.stream.next().await?.ok()?;
            for item in self.decoder.feed(&chunk) {
                if let Ok(event) = item {
                    self.pending.push_back(event);
                }
            }
        }
    }
}
