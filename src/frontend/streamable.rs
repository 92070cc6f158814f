//! Streamable-HTTP frontend listener.
//!
//! `POST <http_path>` carries one JSON-RPC frame. The response is a chunked
//! NDJSON stream that ends once the frame correlated to the request's id has
//! been written, or after an error frame for the same id. Client disconnect
//! mid-flight cancels the outstanding upstream work.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::bridge;
use crate::codec::jsonrpc::{Frame, codes};
use crate::codec::ndjson;
use crate::config::TransportMode;
use crate::session::{self, Session, SessionTable};

use super::AppState;

/// Per-exchange channel capacity.
const CHANNEL_CAPACITY: usize = 32;

/// Handle `POST <http_path>`: one exchange per request.
pub async fn handle_exchange(State(state): State<AppState>, body: Bytes) -> Response {
    let frame = match Frame::parse(&body) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting unparseable request body");
            return single_frame_response(&Frame::error_response(
                None,
                codes::PARSE_ERROR,
                "Parse error",
                None,
            ));
        }
    };
    if !frame.is_forwardable() {
        tracing::warn!("rejecting frame that is neither request nor notification");
        return single_frame_response(&Frame::error_response(
            frame.id(),
            codes::INVALID_REQUEST,
            "Invalid Request",
            None,
        ));
    }

    let session_id = session::generate_id();
    let (frontend_tx, frontend_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let session = Arc::new(Session::new(
        session_id.clone(),
        TransportMode::Streamable,
        state.config.output_mode,
        frontend_tx,
        None,
        state.shutdown.child_token(),
    ));
    state.table.insert(session.clone());
    tracing::info!(
        session_id,
        method = frame.method().unwrap_or(""),
        "downstream exchange opened"
    );

    let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, Infallible>>(CHANNEL_CAPACITY);
    tokio::spawn(exchange_writer(
        session.clone(),
        frontend_rx,
        body_tx,
        state.table.clone(),
    ));
    tokio::spawn(bridge::run_single_exchange(
        session,
        frame,
        state.table.clone(),
        state.http.clone(),
        state.config.output_mode,
        state.config.endpoint.clone(),
    ));

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::TRANSFER_ENCODING, "chunked")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(ReceiverStream::new(body_rx)))
    {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Own the write side of one exchange: NDJSON lines, serialized through
/// this single task.
async fn exchange_writer(
    session: Arc<Session>,
    mut frames: mpsc::Receiver<Frame>,
    body: mpsc::Sender<Result<Bytes, Infallible>>,
    table: SessionTable,
) {
    loop {
        tokio::select! {
            biased;
            _ = session.cancel_token().cancelled() => {
                while let Ok(frame) = frames.try_recv() {
                    if body.send(Ok(ndjson::encode(&frame))).await.is_err() {
                        break;
                    }
                }
                break;
            }
            maybe = frames.recv() => match maybe {
                Some(frame) => {
                    if body.send(Ok(ndjson::encode(&frame))).await.is_err() {
                        tracing::debug!(session_id = %session.id, "downstream client disconnected");
                        break;
                    }
                }
                None => break,
            }
        }
    }

    table.remove(&session.id);
    session.close();
    tracing::debug!(session_id = %session.id, "downstream exchange closed");
}

/// A complete single-line response for frames rejected before a session
/// exists.
fn single_frame_response(frame: &Frame) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        ndjson::encode(frame),
    )
        .into_response()
}
