//! # JSON-RPC 2.0 envelope
//!
//! Outbound messages are plain serde structs. Inbound frames go through
//! [`JsonRpcMessage::parse`], which checks the version tag and branches on
//! the presence of `id` and `method`:
//!
//! | `id` | `method` | classified as |
//! |------|----------|---------------|
//! | yes  | yes      | [`JsonRpcMessage::Request`] (server-initiated) |
//! | yes  | no       | [`JsonRpcMessage::Response`] (absent `result` reads as `null`) |
//! | no   | yes      | [`JsonRpcMessage::Notification`] |
//! | no   | no       | [`MalformedFrame::Unclassifiable`] |

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC version tag. Serializes as `"2.0"` and rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// Request identifier. The client always assigns numbers; servers may use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Numeric identifier
    Number(i64),
    /// String identifier
    String(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self::Number(id as i64)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

/// JSON-RPC request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request identifier
    pub id: MessageId,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: MessageId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response payload. Result and error are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    /// Successful response with result
    Success {
        /// Response result
        result: Value,
    },
    /// Error response
    Error {
        /// Response error
        error: JsonRpcError,
    },
}

/// JSON-RPC response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request identifier; `None` only for responses to unparseable requests
    pub id: Option<MessageId>,
    /// Result or error
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: Value, id: MessageId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: Some(id),
            payload: JsonRpcResponsePayload::Success { result },
        }
    }

    /// Create an error response
    pub fn error_response(error: JsonRpcError, id: MessageId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: Some(id),
            payload: JsonRpcResponsePayload::Error { error },
        }
    }

    /// Get the result if this is a success response
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            JsonRpcResponsePayload::Success { result } => Some(result),
            JsonRpcResponsePayload::Error { .. } => None,
        }
    }

    /// Get the error if this is an error response
    pub fn error(&self) -> Option<&JsonRpcError> {
        match &self.payload {
            JsonRpcResponsePayload::Success { .. } => None,
            JsonRpcResponsePayload::Error { error } => Some(error),
        }
    }
}

/// JSON-RPC notification message (no response expected)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Notification method name
    pub method: String,
    /// Notification parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

fn default_error_code() -> i32 {
    JsonRpcErrorCode::InternalError.code()
}

/// JSON-RPC error object. A missing `code` reads as `-32603`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    #[serde(default = "default_error_code")]
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound.code(),
            format!("Method not found: {method}"),
        )
    }
}

/// Standard JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    /// Parse error (-32700)
    ParseError,
    /// Invalid request (-32600)
    InvalidRequest,
    /// Method not found (-32601)
    MethodNotFound,
    /// Invalid params (-32602)
    InvalidParams,
    /// Internal error (-32603)
    InternalError,
    /// Application-defined error
    ApplicationError(i32),
}

impl JsonRpcErrorCode {
    /// Get the numeric error code
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ApplicationError(code) => *code,
        }
    }
}

/// Why an inbound frame was not a usable JSON-RPC message.
///
/// Never surfaced to API callers; the read loop logs it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedFrame {
    /// Not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// Valid JSON, but not an object
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// `jsonrpc` member absent
    #[error("missing jsonrpc version tag")]
    MissingVersion,
    /// `jsonrpc` member present but not `"2.0"`
    #[error("unsupported jsonrpc version {0}")]
    BadVersion(String),
    /// `id` is neither a number nor a string
    #[error("invalid id {0}")]
    InvalidId(String),
    /// `method` is not a string
    #[error("method must be a string")]
    InvalidMethod,
    /// `error` member could not be decoded
    #[error("invalid error object: {0}")]
    InvalidError(String),
    /// Neither `id` nor `method`
    #[error("frame has neither id nor method")]
    Unclassifiable,
}

/// A classified inbound JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    /// Server-initiated request
    Request(JsonRpcRequest),
    /// Response to a client request
    Response(JsonRpcResponse),
    /// One-way notification
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Parse and classify one frame of text.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedFrame`] if the text is not JSON, lacks the `"2.0"`
    /// version tag, or cannot be classified.
    pub fn parse(frame: &str) -> Result<Self, MalformedFrame> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| MalformedFrame::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Classify an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// See [`JsonRpcMessage::parse`].
    pub fn from_value(value: Value) -> Result<Self, MalformedFrame> {
        let Value::Object(mut obj) = value else {
            return Err(MalformedFrame::NotAnObject);
        };

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(other) => return Err(MalformedFrame::BadVersion(other.to_string())),
            None => return Err(MalformedFrame::MissingVersion),
        }

        let id = obj.remove("id").map(parse_id).transpose()?;
        let method = match obj.remove("method") {
            Some(Value::String(method)) => Some(method),
            Some(_) => return Err(MalformedFrame::InvalidMethod),
            None => None,
        };
        let params = obj.remove("params");

        match (id, method) {
            (Some(Some(id)), Some(method)) => Ok(Self::Request(JsonRpcRequest {
                jsonrpc: JsonRpcVersion,
                id,
                method,
                params,
            })),
            (Some(None), Some(_)) => Err(MalformedFrame::InvalidId("null".to_string())),
            (Some(id), None) => Ok(Self::Response(JsonRpcResponse {
                jsonrpc: JsonRpcVersion,
                id,
                payload: response_payload(&mut obj)?,
            })),
            (None, Some(method)) => Ok(Self::Notification(JsonRpcNotification {
                jsonrpc: JsonRpcVersion,
                method,
                params,
            })),
            (None, None) => Err(MalformedFrame::Unclassifiable),
        }
    }
}

/// `null` ids are legal only on responses and come back as `None`.
fn parse_id(value: Value) -> Result<Option<MessageId>, MalformedFrame> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(MessageId::String(s))),
        Value::Number(n) => n
            .as_i64()
            .map(|n| Some(MessageId::Number(n)))
            .ok_or_else(|| MalformedFrame::InvalidId(n.to_string())),
        other => Err(MalformedFrame::InvalidId(other.to_string())),
    }
}

fn response_payload(obj: &mut Map<String, Value>) -> Result<JsonRpcResponsePayload, MalformedFrame> {
    match obj.remove("error") {
        Some(Value::Null) | None => Ok(JsonRpcResponsePayload::Success {
            result: obj.remove("result").unwrap_or(Value::Null),
        }),
        Some(error) => serde_json::from_value(error)
            .map(|error| JsonRpcResponsePayload::Error { error })
            .map_err(|e| MalformedFrame::InvalidError(e.to_string())),
    }
}
