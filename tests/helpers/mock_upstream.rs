//! Mock MCP upstream server for integration testing.
//!
//! Speaks either upstream transport: `start_streamable` serves `POST /mcp`
//! with an NDJSON reply stream, `start_sse` serves `GET /sse` plus
//! `POST /messages/{sid}`. Responses, extra notifications, and
//! connection-drop injection are configured per method.
//!
//! Note: some methods are provided for future test expansion and may not be
//! used by every test binary; they are covered by `#[allow(dead_code)]`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// Configurable mock upstream.
#[derive(Debug, Clone, Default)]
pub struct MockUpstream {
    responses: HashMap<String, Value>,
    notify_before: HashMap<String, Vec<Value>>,
    close_after: HashSet<String>,
}

struct MockState {
    responses: HashMap<String, Value>,
    notify_before: HashMap<String, Vec<Value>>,
    close_after: HashSet<String>,
    requests: Mutex<Vec<Value>>,
    sse_streams: Mutex<HashMap<String, mpsc::Sender<Result<Bytes, Infallible>>>>,
    counter: AtomicU64,
}

/// Handle to a started mock server.
pub struct MockHandle {
    state: Arc<MockState>,
    _task: JoinHandle<()>,
}

impl MockHandle {
    /// Every JSON-RPC body the mock has received, in order.
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Number of frames received so far.
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `method` with the given `result` value.
    #[must_use]
    pub fn with_result(mut self, method: &str, result: Value) -> Self {
        self.responses.insert(method.to_string(), result);
        self
    }

    /// Emit a notification frame before the response to `method`.
    #[must_use]
    pub fn with_notification_before(mut self, method: &str, frame: Value) -> Self {
        self.notify_before.entry(method.to_string()).or_default().push(frame);
        self
    }

    /// End the connection after responding to `method`.
    #[must_use]
    pub fn with_close_after(mut self, method: &str) -> Self {
        self.close_after.insert(method.to_string());
        self
    }

    fn into_state(self) -> Arc<MockState> {
        Arc::new(MockState {
            responses: self.responses,
            notify_before: self.notify_before,
            close_after: self.close_after,
            requests: Mutex::new(Vec::new()),
            sse_streams: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        })
    }

    /// Start the streamable-HTTP variant on an ephemeral port.
    pub async fn start_streamable(self) -> (SocketAddr, MockHandle) {
        let state = self.into_state();
        let app = Router::new()
            .route("/mcp", post(handle_streamable))
            .with_state(state.clone());
        start(app, state).await
    }

    /// Start the SSE variant on an ephemeral port.
    pub async fn start_sse(self) -> (SocketAddr, MockHandle) {
        let state = self.into_state();
        let app = Router::new()
            .route("/sse", get(handle_sse_open))
            .route("/messages/{sid}", post(handle_sse_message))
            .with_state(state.clone());
        start(app, state).await
    }
}

async fn start(app: Router, state: Arc<MockState>) -> (SocketAddr, MockHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, MockHandle { state, _task: task })
}

/// Build the response frame for a request, falling back to an empty result.
fn response_for(state: &MockState, method: &str, id: Value) -> Value {
    let result = state.responses.get(method).cloned().unwrap_or_else(|| json!({}));
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

async fn handle_streamable(State(state): State<Arc<MockState>>, body: Bytes) -> Response {
    let value: Value = serde_json::from_slice(&body).unwrap();
    state.requests.lock().unwrap().push(value.clone());

    let method = value.get("method").and_then(|m| m.as_str()).unwrap_or("").to_string();
    let id = value.get("id").cloned();

    let mut lines = String::new();
    for frame in state.notify_before.get(&method).into_iter().flatten() {
        lines.push_str(&frame.to_string());
        lines.push('\n');
    }
    if let Some(id) = id {
        lines.push_str(&response_for(&state, &method, id).to_string());
        lines.push('\n');
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        lines,
    )
        .into_response()
}

async fn handle_sse_open(State(state): State<Arc<MockState>>) -> Response {
    let sid = format!("mock-{}", state.counter.fetch_add(1, Ordering::SeqCst));
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(64);
    let _ = tx.try_send(Ok(Bytes::from(format!(
        "event: endpoint\ndata: /messages/{sid}\n\n"
    ))));
    state.sse_streams.lock().unwrap().insert(sid, tx);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap()
}

async fn handle_sse_message(
    State(state): State<Arc<MockState>>,
    Path(sid): Path<String>,
    body: Bytes,
) -> Response {
    let value: Value = serde_json::from_slice(&body).unwrap();
    state.requests.lock().unwrap().push(value.clone());

    let method = value.get("method").and_then(|m| m.as_str()).unwrap_or("").to_string();
    let id = value.get("id").cloned();

    let tx = state.sse_streams.lock().unwrap().get(&sid).cloned();
    if let Some(tx) = tx {
        for frame in state.notify_before.get(&method).into_iter().flatten() {
            let _ = tx.try_send(Ok(message_event(frame)));
        }
        if let Some(id) = id {
            let _ = tx.try_send(Ok(message_event(&response_for(&state, &method, id))));
        }
        if state.close_after.contains(&method) {
            // Dropping the last sender ends the event stream.
            state.sse_streams.lock().unwrap().remove(&sid);
        }
    }

    StatusCode::ACCEPTED.into_response()
}

fn message_event(frame: &Value) -> Bytes {
    Bytes::from(format!("event: message\ndata: {frame}\n\n"))
}
