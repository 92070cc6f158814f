//! Frontend listener.
//!
//! Builds the axum router for the configured input mode and runs the serve
//! loop. One route set per mode: the SSE listener binds the stream route and
//! the message POST route, the streamable listener binds a single POST
//! route. `/health` is always bound.

pub mod health;
pub mod sse;
pub mod streamable;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{ProxyConfig, TransportMode};
use crate::error::ProxyError;
use crate::session::SessionTable;

/// State shared across request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolved runtime configuration.
    pub config: Arc<ProxyConfig>,
    /// Process-wide session table.
    pub table: SessionTable,
    /// Shared HTTP client for upstream connections.
    pub http: reqwest::Client,
    /// Root shutdown token; sessions derive child tokens from it.
    pub shutdown: CancellationToken,
}

/// Build the router for the configured input mode.
pub fn router(state: AppState) -> Router {
    let routes = Router::new().route("/health", get(health::health));
    let routes = match state.config.input_mode {
        TransportMode::Sse => routes
            .route(&state.config.sse_path, get(sse::open_stream))
            .route(
                &format!("{}/{{session_id}}", sse::MESSAGE_PATH_BASE),
                post(sse::post_message),
            ),
        TransportMode::Streamable => {
            routes.route(&state.config.http_path, post(streamable::handle_exchange))
        }
    };
    routes.with_state(state)
}

/// Run the serve loop until the shutdown token fires. Accepts stop as soon
/// as the token is cancelled; open connections end when their session
/// writers finish.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ProxyError> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
