//! Session state and the process-wide session table.
//!
//! A session covers one downstream client's conversation with the proxy. The
//! SSE frontend populates the table when a client opens its stream so the
//! message POST endpoint can route frames to it; the streamable-HTTP frontend
//! inserts a short-lived entry per exchange so `/health` can report it.
//!
//! A session holds exactly one frontend handle and at most one upstream
//! handle. It is removed from the table before its frontend handle closes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::codec::jsonrpc::Frame;
use crate::config::TransportMode;

/// Generate a session id unique for the life of the process: millisecond
/// timestamp in hex plus a random suffix, as a short ASCII token.
pub fn generate_id() -> String {
    let millis = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{millis:x}-{}", &suffix[..8])
}

/// One downstream client's conversation with the proxy.
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// When the session was admitted.
    pub created_at: SystemTime,
    /// Transport the downstream client speaks.
    pub frontend_transport: TransportMode,
    /// Transport the upstream connection speaks.
    pub upstream_transport: TransportMode,
    /// Write side of the downstream stream. Frames sent here are encoded by
    /// the session's stream writer task.
    frontend: mpsc::Sender<Frame>,
    /// Send side of the upstream connection, fed by the SSE message POST
    /// endpoint. Absent for streamable-HTTP sessions, where the request
    /// frame travels with the exchange itself.
    upstream: Option<mpsc::Sender<Frame>>,
    /// Cancelled when the session enters its closing state. Doubles as the
    /// liveness flag.
    cancel: CancellationToken,
}

impl Session {
    /// Create a session. `upstream` carries the frontend-to-upstream queue
    /// for SSE sessions and is `None` for streamable-HTTP exchanges.
    pub fn new(
        id: String,
        frontend_transport: TransportMode,
        upstream_transport: TransportMode,
        frontend: mpsc::Sender<Frame>,
        upstream: Option<mpsc::Sender<Frame>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            created_at: SystemTime::now(),
            frontend_transport,
            upstream_transport,
            frontend,
            upstream,
            cancel,
        }
    }

    /// Queue a frame for delivery to the downstream client. Blocks when the
    /// client is slow; fails once the stream writer has gone away.
    pub async fn send_to_frontend(&self, frame: Frame) -> Result<(), ()> {
        self.frontend.send(frame).await.map_err(|_| ())
    }

    /// Queue a frame for delivery to the upstream. Blocks when the upstream
    /// is slow; fails for sessions without an upstream queue or once the
    /// bridge has gone away.
    pub async fn forward_to_upstream(&self, frame: Frame) -> Result<(), ()> {
        match &self.upstream {
            Some(tx) => tx.send(frame).await.map_err(|_| ()),
            None => Err(()),
        }
    }

    /// The session's cancellation token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True until the session enters its closing state.
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Move the session to its closing state. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Process-wide mapping from session id to session.
///
/// The only cross-session shared structure. Insert on admission, lookup on
/// SSE message POST, delete on session end; all three are linearizable under
/// a single lock.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    inner: Arc<Mutex<HashMap<String, Arc<Session>>>>,
}

impl SessionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session under its id.
    pub fn insert(&self, session: Arc<Session>) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(session.id.clone(), session);
        }
    }

    /// Look up a session by id.
    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.inner.lock().ok().and_then(|map| map.get(id).cloned())
    }

    /// Remove a session by id. Returns the removed session, or `None` if it
    /// was already gone.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.inner.lock().ok().and_then(|mut map| map.remove(id))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// True when no sessions remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
