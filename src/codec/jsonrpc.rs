//! JSON-RPC 2.0 frame model.
//!
//! A [`Frame`] wraps the parsed `serde_json::Value` of a single JSON-RPC
//! envelope together with its classified [`FrameKind`]. The raw value is kept
//! so that fields the proxy does not understand survive forwarding verbatim;
//! only the `jsonrpc` version field is stamped when absent.
//!
//! Classification is determined by the presence of `id` and `method`:
//! - Request: has both `id` and `method`
//! - Notification: has `method` but no `id`
//! - Response: has `id`, no `method`, and exactly one of `result` or `error`

use std::fmt;

use serde_json::Value;

use crate::error::FrameError;

/// Standard JSON-RPC 2.0 error codes used by the proxy.
pub mod codes {
    /// Parse error: invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request: the JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Internal error: upstream or transport failure.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// JSON-RPC 2.0 request ID.
///
/// The id type (string or integer) is preserved exactly: a client that sends
/// `"id": 1` gets `"id": 1` back, never `"id": "1"`. An explicit `"id": null`
/// is valid (though unusual) and distinct from a missing `id` field, which
/// marks a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JsonRpcId {
    /// Integer ID (e.g. `"id": 1`).
    Number(i64),
    /// String ID (e.g. `"id": "abc-123"`).
    String(String),
    /// Explicit null ID.
    Null,
}

impl JsonRpcId {
    /// Parse a JSON value into an ID. Floats, booleans, arrays, and objects
    /// are rejected.
    pub fn from_value(value: &Value) -> Result<Self, FrameError> {
        match value {
            Value::Number(n) => n.as_i64().map(JsonRpcId::Number).ok_or(FrameError::InvalidId),
            Value::String(s) => Ok(JsonRpcId::String(s.clone())),
            Value::Null => Ok(JsonRpcId::Null),
            _ => Err(FrameError::InvalidId),
        }
    }

    /// Convert back into a JSON value for embedding in a frame.
    pub fn to_value(&self) -> Value {
        match self {
            JsonRpcId::Number(n) => Value::from(*n),
            JsonRpcId::String(s) => Value::from(s.clone()),
            JsonRpcId::Null => Value::Null,
        }
    }
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::Number(n) => write!(f, "{n}"),
            JsonRpcId::String(s) => write!(f, "{s}"),
            JsonRpcId::Null => write!(f, "null"),
        }
    }
}

/// Classified shape of a JSON-RPC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Has both `id` and `method`: a request expecting a response.
    Request {
        /// The request ID.
        id: JsonRpcId,
        /// The method name.
        method: String,
    },
    /// Has `method` but no `id`: a fire-and-forget notification.
    Notification {
        /// The method name.
        method: String,
    },
    /// Has `id`, no `method`, and exactly one of `result` or `error`: a
    /// response to a previous request.
    Response {
        /// The ID of the request this responds to.
        id: JsonRpcId,
    },
}

/// A single JSON-RPC 2.0 envelope, carried as its parsed JSON value plus a
/// cached classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    value: Value,
    kind: FrameKind,
}

impl Frame {
    /// Classify a parsed JSON value into a frame.
    ///
    /// A missing `jsonrpc` field is stamped to `"2.0"` rather than rejected;
    /// every frame the proxy forwards carries the version field. All other
    /// fields pass through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the value is not a JSON object, carries a
    /// non-string `method`, carries an invalid `id` type, has neither
    /// `method` nor `id`, or is response-shaped without exactly one of
    /// `result` and `error`.
    pub fn from_value(mut value: Value) -> Result<Self, FrameError> {
        {
            let obj = value.as_object_mut().ok_or_else(|| FrameError::MalformedJson {
                reason: "frame is not a JSON object".to_string(),
            })?;
            if !obj.contains_key("jsonrpc") {
                obj.insert("jsonrpc".to_string(), Value::String("2.0".to_string()));
            }
        }

        let id = match value.get("id") {
            None => None,
            Some(v) => Some(JsonRpcId::from_value(v)?),
        };
        let method = match value.get("method") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(FrameError::MalformedJson {
                    reason: "method is not a string".to_string(),
                });
            }
        };

        let kind = match (id, method) {
            (Some(id), Some(method)) => FrameKind::Request { id, method },
            (None, Some(method)) => FrameKind::Notification { method },
            (Some(id), None) => {
                // A response carries exactly one of result and error.
                let has_result = value.get("result").is_some();
                let has_error = value.get("error").is_some();
                if has_result == has_error {
                    let reason = if has_result {
                        "response carries both result and error"
                    } else {
                        "response carries neither result nor error"
                    };
                    return Err(FrameError::MalformedJson {
                        reason: reason.to_string(),
                    });
                }
                FrameKind::Response { id }
            }
            (None, None) => return Err(FrameError::AmbiguousShape),
        };

        Ok(Self { value, kind })
    }

    /// Parse raw bytes into a frame.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| FrameError::MalformedJson {
                reason: e.to_string(),
            })?;
        Self::from_value(value)
    }

    /// Build an error response frame.
    ///
    /// `id` is the originating request's ID when correlation is possible;
    /// `None` serializes as `"id": null`.
    pub fn error_response(
        id: Option<&JsonRpcId>,
        code: i32,
        message: &str,
        data: Option<Value>,
    ) -> Self {
        let mut error = serde_json::Map::new();
        error.insert("code".to_string(), Value::from(code));
        error.insert("message".to_string(), Value::from(message));
        if let Some(data) = data {
            error.insert("data".to_string(), data);
        }

        let id = id.cloned().unwrap_or(JsonRpcId::Null);
        let mut obj = serde_json::Map::new();
        obj.insert("jsonrpc".to_string(), Value::String("2.0".to_string()));
        obj.insert("id".to_string(), id.to_value());
        obj.insert("error".to_string(), Value::Object(error));

        Self {
            value: Value::Object(obj),
            kind: FrameKind::Response { id },
        }
    }

    /// The classified shape of this frame.
    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    /// The frame's ID, if it is a request or response.
    pub fn id(&self) -> Option<&JsonRpcId> {
        match &self.kind {
            FrameKind::Request { id, .. } | FrameKind::Response { id } => Some(id),
            FrameKind::Notification { .. } => None,
        }
    }

    /// The frame's method, if it is a request or notification. Responses
    /// carry no method.
    pub fn method(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Request { method, .. } | FrameKind::Notification { method } => {
                Some(method.as_str())
            }
            FrameKind::Response { .. } => None,
        }
    }

    /// True for requests and notifications, the only shapes a frontend may
    /// forward to the upstream.
    pub fn is_forwardable(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::Request { .. } | FrameKind::Notification { .. }
        )
    }

    /// True if this frame is a response carrying the given ID.
    pub fn is_response_to(&self, id: &JsonRpcId) -> bool {
        matches!(&self.kind, FrameKind::Response { id: rid } if rid == id)
    }

    /// The underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.value).unwrap_or_else(|_| "{}".to_string())
    }
}
