//! Client configuration.
//!
//! [`ClientConfig`] is a plain serde struct so callers can load it from
//! whatever file format their CLI uses. Durations use serde's standard
//! `Duration` representation.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pipemcp_protocol::types::{ClientCapabilities, Implementation};
use pipemcp_protocol::{McpError, McpResult, PROTOCOL_VERSION};
use pipemcp_transport::{ChildProcessConfig, DEFAULT_MAX_FRAME_LENGTH};

/// How to launch the MCP server process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Executable to run
    pub command: String,
    /// Arguments passed to the executable
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Working directory, inherited when `None`
    pub working_directory: Option<String>,
}

impl ServerConfig {
    /// Server launched as `command args...`
    pub fn new(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Connection configuration for the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server process to launch
    pub server: ServerConfig,
    /// Default per-request timeout
    pub timeout: Duration,
    /// Timeout for the liveness ping issued by health checks
    pub health_check_timeout: Duration,
    /// Grace period between SIGTERM and force kill on disconnect
    pub shutdown_timeout: Duration,
    /// Connection attempts made by `connect_with_retry`
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
    /// Largest frame accepted or sent, in bytes
    pub max_message_size: usize,
    /// Capabilities announced in the handshake
    pub capabilities: ClientCapabilities,
    /// Identity announced in the handshake
    pub client_info: Implementation,
    /// Protocol version offered in the handshake
    pub protocol_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            timeout: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_message_size: DEFAULT_MAX_FRAME_LENGTH,
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::default(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

impl ClientConfig {
    /// Default configuration for the given server
    pub fn for_server(server: ServerConfig) -> Self {
        Self {
            server,
            ..Default::default()
        }
    }

    /// Check the configuration before any process is started.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty command, a zero timeout or
    /// a zero frame limit.
    pub fn validate(&self) -> McpResult<()> {
        if self.server.command.trim().is_empty() {
            return Err(McpError::configuration("server command cannot be empty"));
        }
        if self.timeout.is_zero() {
            return Err(McpError::configuration("request timeout must be positive"));
        }
        if self.health_check_timeout.is_zero() {
            return Err(McpError::configuration(
                "health check timeout must be positive",
            ));
        }
        if self.max_message_size == 0 {
            return Err(McpError::configuration("max message size must be positive"));
        }
        Ok(())
    }

    /// Process settings for the child process transport
    pub fn child_process(&self) -> ChildProcessConfig {
        ChildProcessConfig {
            command: self.server.command.clone(),
            args: self.server.args.clone(),
            working_directory: self.server.working_directory.clone(),
            environment: self.server.env.clone(),
            shutdown_timeout: self.shutdown_timeout,
            max_message_size: self.max_message_size,
            kill_on_drop: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipemcp_protocol::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.health_check_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
    }

    #[test]
    fn validate_rejects_empty_command_and_zero_timeout() {
        let err = ClientConfig::default().validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);

        let config = ClientConfig {
            timeout: Duration::ZERO,
            ..ClientConfig::for_server(ServerConfig::new("srv", ["--stdio"]))
        };
        assert_eq!(config.validate().unwrap_err().kind, ErrorKind::Configuration);

        let config = ClientConfig::for_server(ServerConfig::new("srv", ["--stdio"]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn child_process_settings_follow_config() {
        let mut server = ServerConfig::new("node", ["server.js"]);
        server.env.insert("DEBUG".to_string(), "1".to_string());
        let config = ClientConfig {
            shutdown_timeout: Duration::from_millis(750),
            ..ClientConfig::for_server(server)
        };
        let process = config.child_process();
        assert_eq!(process.command, "node");
        assert_eq!(process.args, vec!["server.js".to_string()]);
        assert_eq!(process.environment.get("DEBUG").map(String::as_str), Some("1"));
        assert_eq!(process.shutdown_timeout, Duration::from_millis(750));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "server": {"command": "srv"},
            "max_retries": 5
        }))
        .unwrap();
        assert_eq!(config.server.command, "srv");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
