//! Transport error types.

use thiserror::Error;

use pipemcp_protocol::McpError;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised while launching, writing to, or closing a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The server could not be started.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The write side is gone (stdin closed, process exited, transport closed).
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Writing a frame failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConfigurationError(msg) => McpError::configuration(msg),
            other => McpError::connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipemcp_protocol::ErrorKind;

    #[test]
    fn transport_errors_become_connection_errors() {
        let err: McpError = TransportError::SendFailed("broken pipe".to_string()).into();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert!(err.message.contains("broken pipe"));

        let err: McpError =
            TransportError::ConfigurationError("Command cannot be empty".to_string()).into();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        assert!(matches!(TransportError::from(io), TransportError::Io(msg) if msg.contains("pipe closed")));
    }
}
