//! Health probe.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::AppState;

/// Health probe response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves traffic.
    pub status: &'static str,
    /// Configured downstream transport.
    pub input_mode: String,
    /// Configured upstream transport.
    pub output_mode: String,
    /// Number of live sessions.
    pub sessions: usize,
}

/// Handle `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        input_mode: state.config.input_mode.to_string(),
        output_mode: state.config.output_mode.to_string(),
        sessions: state.table.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::cli::Args;
    use crate::config::ProxyConfig;
    use crate::frontend::{AppState, router};
    use crate::session::SessionTable;

    fn test_state() -> AppState {
        let args = Args::try_parse_from(["mcp-bridge"]).unwrap();
        AppState {
            config: Arc::new(ProxyConfig::from_args(args).unwrap()),
            table: SessionTable::new(),
            http: reqwest::Client::new(),
            shutdown: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn health_reports_modes_and_session_count() {
        let app = router(test_state());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["inputMode"], "sse");
        assert_eq!(json["outputMode"], "streamable");
        assert_eq!(json["sessions"], 0);
    }

    #[tokio::test]
    async fn unknown_session_post_returns_404() {
        let app = router(test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/messages/does-not-exist")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Session not found");
    }
}
