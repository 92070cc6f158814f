//! SSE frontend listener.
//!
//! `GET <sse_path>` opens the long-lived event stream: the first event is
//! the `endpoint` advertisement naming `messages/<session_id>`, followed by
//! `message` events and `:ping` heartbeats. `POST /messages/{session_id}`
//! carries one JSON-RPC frame per request and always returns `202` on a
//! session hit; replies, including errors, travel on the SSE stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::bridge;
use crate::codec::jsonrpc::{Frame, codes};
use crate::codec::sse as wire;
use crate::config::TransportMode;
use crate::session::{self, Session, SessionTable};

use super::AppState;

/// Base path of the message POST route. The endpoint advertisement names
/// `messages/<session_id>` relative to the server root.
pub const MESSAGE_PATH_BASE: &str = "/messages";

/// Interval between `:ping` comment heartbeats on an open stream.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Per-session channel capacity. Senders block when the consumer is slow.
const CHANNEL_CAPACITY: usize = 32;

/// Handle `GET <sse_path>`: admit the client, mint a session, and hand it to
/// the bridge.
pub async fn open_stream(State(state): State<AppState>) -> Response {
    let session_id = session::generate_id();
    let (frontend_tx, frontend_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (client_tx, client_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let session = Arc::new(Session::new(
        session_id.clone(),
        TransportMode::Sse,
        state.config.output_mode,
        frontend_tx,
        Some(client_tx),
        state.shutdown.child_token(),
    ));
    state.table.insert(session.clone());
    tracing::info!(session_id, "downstream SSE client connected");

    let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, Infallible>>(CHANNEL_CAPACITY);
    tokio::spawn(stream_writer(
        session.clone(),
        frontend_rx,
        body_tx,
        state.table.clone(),
    ));
    tokio::spawn(bridge::run_streaming_session(
        session,
        client_rx,
        state.table.clone(),
        state.http.clone(),
        state.config.output_mode,
        state.config.endpoint.clone(),
    ));

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(ReceiverStream::new(body_rx)))
    {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Handle `POST /messages/{session_id}`: route one frame into the session.
pub async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Response {
    let Some(session) = state.table.lookup(&session_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Session not found" })),
        )
            .into_response();
    };

    match Frame::parse(&body) {
        Ok(frame) if frame.is_forwardable() => {
            if session.forward_to_upstream(frame).await.is_err() {
                tracing::warn!(session_id, "frame arrived while the session is closing");
            }
        }
        Ok(frame) => {
            tracing::warn!(
                session_id,
                "dropping frame that is neither request nor notification"
            );
            let reply =
                Frame::error_response(frame.id(), codes::INVALID_REQUEST, "Invalid Request", None);
            let _ = session.send_to_frontend(reply).await;
        }
        Err(e) => {
            tracing::warn!(session_id, error = %e, "dropping unparseable frame");
        }
    }

    // Accepted regardless of the upstream outcome; errors reach the client
    // on the SSE stream.
    StatusCode::ACCEPTED.into_response()
}

/// Own the write side of one SSE stream: endpoint advertisement first, then
/// message events and heartbeats, serialized through this single task.
async fn stream_writer(
    session: Arc<Session>,
    mut frames: mpsc::Receiver<Frame>,
    body: mpsc::Sender<Result<Bytes, Infallible>>,
    table: SessionTable,
) {
    let advertised = format!("messages/{}", session.id);
    if body.send(Ok(wire::endpoint_event(&advertised))).await.is_err() {
        close_stream(&session, &table);
        return;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // skip the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = session.cancel_token().cancelled() => {
                // Flush what is already queued, then end the stream.
                while let Ok(frame) = frames.try_recv() {
                    if body.send(Ok(wire::message_event(&frame))).await.is_err() {
                        break;
                    }
                }
                break;
            }
            maybe = frames.recv() => match maybe {
                Some(frame) => {
                    if body.send(Ok(wire::message_event(&frame))).await.is_err() {
                        tracing::debug!(session_id = %session.id, "downstream client disconnected");
                        break;
                    }
                }
                None => break,
            },
            _ = heartbeat.tick() => {
                if body.send(Ok(Bytes::from_static(wire::PING))).await.is_err() {
                    tracing::debug!(session_id = %session.id, "heartbeat hit a closed stream");
                    break;
                }
            }
        }
    }

    close_stream(&session, &table);
    tracing::info!(session_id = %session.id, "downstream SSE stream closed");
}

/// Remove the session from the table, then close it. Safe to call from both
/// the writer and the bridge.
fn close_stream(session: &Session, table: &SessionTable) {
    table.remove(&session.id);
    session.close();
}
