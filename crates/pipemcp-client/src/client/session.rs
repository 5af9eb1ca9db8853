//! Connection phase and negotiated server state.
//!
//! ```text
//! disconnected -> connecting -> connected -> initializing -> ready
//!                     |                          |
//!                     +--> disconnected          +--> connected (handshake failed)
//! ```
//!
//! Any phase moves to `disconnected` on disconnect. Transitions happen under
//! one short `parking_lot` lock owned by the client; nothing here awaits.

use std::fmt;

use serde::{Deserialize, Serialize};

use pipemcp_protocol::types::{InitializeResult, ServerCapabilities};
use pipemcp_protocol::{Implementation, McpError, McpResult};

/// Lifecycle phase of a client connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// No server process
    #[default]
    Disconnected,
    /// Server process is being launched
    Connecting,
    /// Pipes are open, handshake not done
    Connected,
    /// Handshake in flight
    Initializing,
    /// Handshake done, feature calls allowed
    Ready,
}

impl ConnectionPhase {
    /// Phase name as used in error messages
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
        }
    }

    /// Whether pipes to the server are open
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Initializing | Self::Ready)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) phase: ConnectionPhase,
    pub(crate) server_info: Option<Implementation>,
    pub(crate) server_capabilities: Option<ServerCapabilities>,
    pub(crate) protocol_version: Option<String>,
    pub(crate) instructions: Option<String>,
}

impl Session {
    pub(crate) fn begin_connect(&mut self) -> McpResult<()> {
        if self.phase != ConnectionPhase::Disconnected {
            return Err(McpError::connection(format!(
                "already connected or connecting (phase: {})",
                self.phase
            )));
        }
        self.phase = ConnectionPhase::Connecting;
        Ok(())
    }

    pub(crate) fn connected(&mut self) {
        if self.phase == ConnectionPhase::Connecting {
            self.phase = ConnectionPhase::Connected;
        }
    }

    pub(crate) fn begin_initialize(&mut self) -> McpResult<()> {
        match self.phase {
            ConnectionPhase::Connected | ConnectionPhase::Ready => {
                self.clear_server_state();
                self.phase = ConnectionPhase::Initializing;
                Ok(())
            }
            ConnectionPhase::Initializing => Err(McpError::connection(
                "initialize already in progress",
            )),
            phase => Err(McpError::connection(format!(
                "cannot initialize while {phase}"
            ))),
        }
    }

    /// Stores the handshake result. Returns `false` if the connection was
    /// torn down while the handshake was in flight.
    pub(crate) fn finish_initialize(&mut self, result: &InitializeResult) -> bool {
        if self.phase != ConnectionPhase::Initializing {
            return false;
        }
        self.server_info = Some(result.server_info.clone());
        self.server_capabilities = Some(result.capabilities.clone());
        self.protocol_version = Some(result.protocol_version.clone());
        self.instructions = result.instructions.clone();
        self.phase = ConnectionPhase::Ready;
        true
    }

    pub(crate) fn fail_initialize(&mut self) {
        if self.phase == ConnectionPhase::Initializing {
            self.phase = ConnectionPhase::Connected;
        }
    }

    pub(crate) fn require_ready(&self, operation: &str) -> McpResult<()> {
        if self.phase == ConnectionPhase::Ready {
            Ok(())
        } else {
            Err(McpError::connection(format!(
                "{operation} requires a ready connection (phase: {})",
                self.phase
            ))
            .with_method(operation))
        }
    }

    pub(crate) fn require_connected(&self, operation: &str) -> McpResult<()> {
        if self.phase.is_connected() {
            Ok(())
        } else {
            Err(McpError::connection(format!(
                "{operation} requires an open connection (phase: {})",
                self.phase
            ))
            .with_method(operation))
        }
    }

    pub(crate) fn reset(&mut self) {
        self.phase = ConnectionPhase::Disconnected;
        self.clear_server_state();
    }

    fn clear_server_state(&mut self) {
        self.server_info = None;
        self.server_capabilities = None;
        self.protocol_version = None;
        self.instructions = None;
    }
}
