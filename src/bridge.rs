//! Session bridge: couples a frontend session to an upstream client and
//! routes frames in both directions.
//!
//! A session moves through Admitting (listener accepted the client),
//! Connecting (upstream connect in flight), Active (both pumps running), and
//! Closing (first of frontend disconnect, upstream disconnect, fatal error,
//! or shutdown signal). Closing releases both handles and removes the
//! session from the table; removal always precedes the frontend handle
//! closing.
//!
//! The bridge never rewrites ids: the upstream's id space and the frontend's
//! id space are the same. Frames are forwarded in arrival order per
//! direction, and writes to each side are serialized through that side's
//! single consumer.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::jsonrpc::{Frame, FrameKind, codes};
use crate::config::TransportMode;
use crate::error::UpstreamError;
use crate::session::{Session, SessionTable};
use crate::upstream::UpstreamClient;

/// Drive a long-lived session for a streaming (SSE) frontend.
///
/// Frames posted by the client arrive on `client_rx` and are pushed to the
/// upstream; frames from the upstream are pushed to the session's frontend
/// handle. The session ends on the first of: client disconnect, upstream
/// disconnect, fatal write failure, or shutdown.
pub async fn run_streaming_session(
    session: Arc<Session>,
    mut client_rx: mpsc::Receiver<Frame>,
    table: SessionTable,
    http: reqwest::Client,
    upstream_mode: TransportMode,
    endpoint: reqwest::Url,
) {
    let (client, mut upstream_rx) =
        match UpstreamClient::connect(upstream_mode, &endpoint, &http).await {
            Ok(pair) => pair,
            Err(e) => {
                report_connect_failure(&session, &table, None, &e).await;
                return;
            }
        };
    tracing::info!(
        session_id = %session.id,
        upstream = %session.upstream_transport,
        "session active"
    );

    let client = Arc::new(client);

    // Frontend to upstream pump. The single consumer serializes upstream
    // writes.
    let mut to_upstream = {
        let session = session.clone();
        let client = client.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = session.cancel_token().cancelled() => break,
                    maybe = client_rx.recv() => match maybe {
                        Some(frame) => {
                            tracing::info!(
                                session_id = %session.id,
                                direction = "client_to_upstream",
                                method = frame.method().unwrap_or(""),
                                "frame forwarded"
                            );
                            match client.send(&frame).await {
                                Ok(()) => {}
                                Err(UpstreamError::Send { reason }) => {
                                    // The session survives a failed delivery;
                                    // correlatable failures go back as error
                                    // responses, id-less ones are only logged.
                                    tracing::warn!(
                                        session_id = %session.id,
                                        reason = %reason,
                                        "upstream send failed"
                                    );
                                    if let Some(id) = frame.id() {
                                        let reply = Frame::error_response(
                                            Some(id),
                                            codes::INTERNAL_ERROR,
                                            "Internal error",
                                            Some(serde_json::json!({ "upstream": reason })),
                                        );
                                        if session.send_to_frontend(reply).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        session_id = %session.id,
                                        error = %e,
                                        "upstream unusable"
                                    );
                                    break;
                                }
                            }
                        }
                        None => break,
                    }
                }
            }
        })
    };

    // Upstream to frontend pump. Correlation is implicit: the frame carries
    // its id, or is a notification.
    let mut to_frontend = {
        let session = session.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = session.cancel_token().cancelled() => break,
                    maybe = upstream_rx.recv() => match maybe {
                        Some(frame) => {
                            // Upstream-originated requests are not supported;
                            // only responses and notifications go downstream.
                            if matches!(frame.kind(), FrameKind::Request { .. }) {
                                tracing::warn!(
                                    session_id = %session.id,
                                    method = frame.method().unwrap_or(""),
                                    "dropping upstream-originated request"
                                );
                                continue;
                            }
                            tracing::info!(
                                session_id = %session.id,
                                direction = "upstream_to_client",
                                method = frame.method().unwrap_or(""),
                                "frame forwarded"
                            );
                            if session.send_to_frontend(frame).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            tracing::debug!(session_id = %session.id, "upstream disconnected");
                            break;
                        }
                    }
                }
            }
        })
    };

    // Either pump ending moves the session to Closing; the other pump
    // observes the cancellation at its next suspension point.
    tokio::select! {
        _ = &mut to_upstream => {}
        _ = &mut to_frontend => {}
    }
    client.close();
    finish(&session, &table);
    tracing::info!(session_id = %session.id, "session closed");
}

/// Drive a single request/response exchange for a streamable-HTTP frontend.
///
/// The exchange ends once the response carrying the request's id has been
/// written to the frontend, or on disconnect, upstream EOF, or shutdown. A
/// notification has nothing to wait for: it is forwarded and the exchange
/// ends immediately.
pub async fn run_single_exchange(
    session: Arc<Session>,
    request: Frame,
    table: SessionTable,
    http: reqwest::Client,
    upstream_mode: TransportMode,
    endpoint: reqwest::Url,
) {
    let terminal = request.id().cloned();

    let (client, mut upstream_rx) =
        match UpstreamClient::connect(upstream_mode, &endpoint, &http).await {
            Ok(pair) => pair,
            Err(e) => {
                report_connect_failure(&session, &table, request.id(), &e).await;
                return;
            }
        };
    tracing::info!(
        session_id = %session.id,
        upstream = %session.upstream_transport,
        method = request.method().unwrap_or(""),
        "exchange active"
    );

    match client.send(&request).await {
        Ok(()) => {}
        Err(UpstreamError::Send { reason }) => {
            tracing::warn!(session_id = %session.id, reason = %reason, "upstream send failed");
            if request.id().is_some() {
                let reply = Frame::error_response(
                    request.id(),
                    codes::INTERNAL_ERROR,
                    "Internal error",
                    Some(serde_json::json!({ "upstream": reason })),
                );
                let _ = session.send_to_frontend(reply).await;
            }
            client.close();
            finish(&session, &table);
            return;
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "upstream unusable");
            client.close();
            finish(&session, &table);
            return;
        }
    }

    let Some(terminal) = terminal else {
        client.close();
        finish(&session, &table);
        return;
    };

    loop {
        tokio::select! {
            biased;
            _ = session.cancel_token().cancelled() => break,
            maybe = upstream_rx.recv() => match maybe {
                Some(frame) => {
                    if matches!(frame.kind(), FrameKind::Request { .. }) {
                        tracing::warn!(
                            session_id = %session.id,
                            method = frame.method().unwrap_or(""),
                            "dropping upstream-originated request"
                        );
                        continue;
                    }
                    let done = frame.is_response_to(&terminal);
                    tracing::info!(
                        session_id = %session.id,
                        direction = "upstream_to_client",
                        method = frame.method().unwrap_or(""),
                        "frame forwarded"
                    );
                    if session.send_to_frontend(frame).await.is_err() {
                        break;
                    }
                    if done {
                        break;
                    }
                }
                None => {
                    tracing::debug!(session_id = %session.id, "upstream disconnected");
                    break;
                }
            }
        }
    }

    client.close();
    finish(&session, &table);
}

/// Send the single error frame for a failed upstream connect, then close.
async fn report_connect_failure(
    session: &Session,
    table: &SessionTable,
    id: Option<&crate::codec::jsonrpc::JsonRpcId>,
    error: &UpstreamError,
) {
    tracing::warn!(session_id = %session.id, error = %error, "upstream connect failed");
    let reply = Frame::error_response(
        id,
        codes::INTERNAL_ERROR,
        "Internal error",
        Some(serde_json::json!({ "upstream": error.to_string() })),
    );
    let _ = session.send_to_frontend(reply).await;
    finish(session, table);
}

/// Move the session to terminal state: drop the table entry first, then
/// signal the frontend handle to close.
fn finish(session: &Session, table: &SessionTable) {
    table.remove(&session.id);
    session.close();
}
