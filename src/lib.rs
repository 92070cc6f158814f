/*!
Transport-translating reverse proxy for MCP servers.

Accepts downstream clients speaking either MCP wire transport, SSE or
streamable HTTP, and forwards to an upstream server speaking either
transport, preserving JSON-RPC request/response correlation and streaming.

# Architecture

- [`codec`]: the JSON-RPC frame model and the two wire codecs.
- [`upstream`]: the upstream client, one variant per transport, behind a
  uniform connect / send / incoming / close surface.
- [`frontend`]: the downstream listener, one route set per transport, plus
  the health probe.
- [`bridge`]: couples one frontend session to one upstream connection and
  runs the two directional pumps.
- [`session`]: session state and the process-wide session table.

Each session is serviced by independent tasks; writes to either side are
serialized through that side's single consumer, and all queues are bounded
so a slow destination pauses the source.
*/

pub mod bridge;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod frontend;
pub mod session;
pub mod upstream;

pub use cli::Args;
pub use config::{ProxyConfig, TransportMode};
pub use error::ProxyError;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use frontend::AppState;
use session::SessionTable;

/// Grace period after the shutdown signal for in-flight connections to
/// drain before their sockets are forcibly closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Bind the configured port and serve until an interrupt arrives.
///
/// # Errors
///
/// Returns [`ProxyError::Bind`] when the listen address is unavailable and
/// [`ProxyError::Config`] when the HTTP client cannot be built.
pub async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await.map_err(|e| ProxyError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!(error = %e, "failed to install shutdown signal handler"),
            }
        });
    }

    run_with_listener(config, listener, shutdown).await
}

/// Serve on an already-bound listener until the shutdown token fires.
///
/// Cancelling the token stops new accepts and moves every session to its
/// closing state; sessions derive child tokens from it. In-flight writes
/// get the grace period to finish; connections still open after it lapses
/// are forcibly closed, so a stalled client cannot wedge the exit.
pub async fn run_with_listener(
    config: ProxyConfig,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), ProxyError> {
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .tcp_nodelay(true)
        .build()
        .map_err(|e| ProxyError::Config(format!("failed to build HTTP client: {e}")))?;

    let table = SessionTable::new();
    let state = AppState {
        config: Arc::new(config),
        table: table.clone(),
        http,
        shutdown: shutdown.clone(),
    };

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(
            addr = %addr,
            input_mode = %state.config.input_mode,
            output_mode = %state.config.output_mode,
            endpoint = %state.config.endpoint,
            "listening"
        );
    }

    let mut serve_task = tokio::spawn(frontend::serve(listener, state));

    tokio::select! {
        result = &mut serve_task => {
            // The serve loop ended without a shutdown signal (IO failure).
            return serve_outcome(result);
        }
        _ = shutdown.cancelled() => {}
    }

    // Bounded drain: sessions observe the cancellation at their next
    // suspension point and finish their writes; whatever is still open when
    // the grace period lapses is forcibly closed.
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut serve_task).await {
        Ok(result) => serve_outcome(result)?,
        Err(_) => {
            serve_task.abort();
            tracing::warn!(
                sessions = table.len(),
                "forcing shutdown after grace period"
            );
        }
    }

    let open = table.len();
    if open > 0 {
        tracing::warn!(sessions = open, "sessions still open after shutdown grace period");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Unwrap the spawned serve task's join result.
fn serve_outcome(
    result: Result<Result<(), ProxyError>, tokio::task::JoinError>,
) -> Result<(), ProxyError> {
    match result {
        Ok(outcome) => outcome,
        Err(e) => Err(ProxyError::Io(std::io::Error::other(e))),
    }
}
