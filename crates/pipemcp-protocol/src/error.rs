//! Unified error type for pipemcp operations.
//!
//! Every fallible client call resolves to [`McpError`], classified by
//! [`ErrorKind`]. Callers match on the kind; the message is for humans.
//!
//! ```rust
//! use pipemcp_protocol::{ErrorKind, McpError};
//! use std::time::Duration;
//!
//! let err = McpError::timeout("tools/list", Duration::from_millis(50));
//! assert_eq!(err.kind, ErrorKind::Timeout);
//! assert!(err.to_string().contains("tools/list"));
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jsonrpc::JsonRpcError;

/// A specialized `Result` for pipemcp operations.
pub type McpResult<T> = std::result::Result<T, McpError>;

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Process could not be spawned, a write failed, the operation is illegal
    /// in the current phase, or the connection was torn down underneath it.
    Connection,
    /// No matching response arrived within the bound.
    Timeout,
    /// The server answered with a JSON-RPC error object.
    Protocol,
    /// Params could not be encoded or a result could not be decoded.
    Serialization,
    /// Client or transport configuration is invalid.
    Configuration,
}

impl ErrorKind {
    /// Human-readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Connection => "Connection error",
            Self::Timeout => "Request timed out",
            Self::Protocol => "Protocol error",
            Self::Serialization => "Serialization error",
            Self::Configuration => "Configuration error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Error returned by every fallible pipemcp operation.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct McpError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// JSON-RPC error code, present for [`ErrorKind::Protocol`]
    pub code: Option<i32>,
    /// Optional JSON-RPC error data, present for [`ErrorKind::Protocol`]
    pub data: Option<serde_json::Value>,
    /// Method the failing request was sent with, when known
    pub method: Option<String>,
}

impl McpError {
    /// Create an error with kind and message
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            data: None,
            method: None,
        }
    }

    /// Create a connection error
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Create a timeout error naming the method and the bound that elapsed
    #[must_use]
    pub fn timeout(method: impl Into<String>, timeout: Duration) -> Self {
        let method = method.into();
        Self::new(
            ErrorKind::Timeout,
            format!("{method} timed out after {}ms", timeout.as_millis()),
        )
        .with_method(method)
    }

    /// Create a protocol error from a server-supplied JSON-RPC error object
    #[must_use]
    pub fn protocol(error: JsonRpcError) -> Self {
        Self {
            kind: ErrorKind::Protocol,
            message: error.message,
            code: Some(error.code),
            data: error.data,
            method: None,
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Attach the method name of the request that failed
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// `true` for connection errors
    #[must_use]
    pub fn is_connection(&self) -> bool {
        self.kind == ErrorKind::Connection
    }

    /// `true` for timeouts
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// `true` for server-reported JSON-RPC errors
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        self.kind == ErrorKind::Protocol
    }

    /// Whether another attempt could succeed. Used by caller-level retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Connection | ErrorKind::Timeout)
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {err}"))
    }
}
