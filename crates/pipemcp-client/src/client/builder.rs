//! Client builder pattern for MCP client construction
//!
//! Provides a fluent interface for configuring client options before creation.

use std::sync::Arc;
use std::time::Duration;

use pipemcp_protocol::types::ClientCapabilities;
use pipemcp_protocol::{Implementation, McpResult};
use pipemcp_transport::TransportFactory;

use super::config::ClientConfig;
use super::core::Client;
use crate::handlers::{
    HandlerRegistry, LogHandler, PromptListChangedHandler, ResourceListChangedHandler,
    ToolListChangedHandler,
};

/// Builder for configuring and creating MCP clients
///
/// # Examples
///
/// ```rust,no_run
/// use pipemcp_client::ClientBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> pipemcp_protocol::McpResult<()> {
/// let client = ClientBuilder::new()
///     .with_command("npx")
///     .with_args(["-y", "@modelcontextprotocol/server-everything"])
///     .with_env("LOG_LEVEL", "debug")
///     .with_timeout(Duration::from_secs(60))
///     .with_max_retries(5)
///     .build()?;
///
/// client.connect().await?;
/// client.initialize().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    handlers: HandlerRegistry,
}

impl ClientBuilder {
    /// Create a new client builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
        }
    }

    // ============================================================================
    // SERVER PROCESS
    // ============================================================================

    /// Executable that runs the server
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.config.server.command = command.into();
        self
    }

    /// Append one argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.server.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config
            .server
            .args
            .extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the server, on top of the inherited
    /// environment
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.server.env.insert(key.into(), value.into());
        self
    }

    /// Working directory of the server process
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.config.server.working_directory = Some(dir.into());
        self
    }

    // ============================================================================
    // CONNECTION CONFIGURATION
    // ============================================================================

    /// Default timeout for every request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Timeout of the ping sent by `health_status()`
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.config.health_check_timeout = timeout;
        self
    }

    /// Grace period between SIGTERM and SIGKILL on disconnect
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Retries used by `RetryPolicy::from_config`
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Initial delay used by `RetryPolicy::from_config`
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.config.retry_delay = retry_delay;
        self
    }

    /// Largest accepted frame in bytes
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.config.max_message_size = max_message_size;
        self
    }

    // ============================================================================
    // HANDSHAKE
    // ============================================================================

    /// Set all capabilities from a ClientCapabilities struct
    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Identity announced to the server
    pub fn with_client_info(mut self, client_info: Implementation) -> Self {
        self.config.client_info = client_info;
        self
    }

    /// Protocol version offered in the handshake
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    // ============================================================================
    // HANDLERS
    // ============================================================================

    /// Handler for `notifications/tools/list_changed`
    pub fn with_tool_list_changed_handler(
        mut self,
        handler: Arc<dyn ToolListChangedHandler>,
    ) -> Self {
        self.handlers.set_tool_list_changed_handler(handler);
        self
    }

    /// Handler for `notifications/prompts/list_changed`
    pub fn with_prompt_list_changed_handler(
        mut self,
        handler: Arc<dyn PromptListChangedHandler>,
    ) -> Self {
        self.handlers.set_prompt_list_changed_handler(handler);
        self
    }

    /// Handler for `notifications/resources/list_changed`
    pub fn with_resource_list_changed_handler(
        mut self,
        handler: Arc<dyn ResourceListChangedHandler>,
    ) -> Self {
        self.handlers.set_resource_list_changed_handler(handler);
        self
    }

    /// Handler for server log records
    pub fn with_log_handler(mut self, handler: Arc<dyn LogHandler>) -> Self {
        self.handlers.set_log_handler(handler);
        self
    }

    /// Configuration built so far
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ============================================================================
    // BUILD
    // ============================================================================

    /// Validate the configuration and create a client that launches the
    /// configured command
    ///
    /// # Errors
    ///
    /// Returns a configuration error if [`ClientConfig::validate`] fails.
    pub fn build(self) -> McpResult<Client> {
        self.config.validate()?;
        let client = Client::new(self.config);
        *client.inner.handlers.lock() = self.handlers;
        Ok(client)
    }

    /// Validate the configuration and create a client on a custom transport
    /// factory
    ///
    /// # Errors
    ///
    /// Returns a configuration error if [`ClientConfig::validate`] fails.
    pub fn build_with_factory(self, factory: Arc<dyn TransportFactory>) -> McpResult<Client> {
        self.config.validate()?;
        let client = Client::with_factory(self.config, factory);
        *client.inner.handlers.lock() = self.handlers;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipemcp_protocol::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn fluent_configuration() {
        let builder = ClientBuilder::new()
            .with_command("python")
            .with_arg("-m")
            .with_args(["tool_server", "--stdio"])
            .with_env("PYTHONUNBUFFERED", "1")
            .with_working_directory("/srv")
            .with_timeout(Duration::from_secs(10))
            .with_shutdown_timeout(Duration::from_secs(2))
            .with_max_retries(0)
            .with_protocol_version("2024-11-05");

        let config = builder.config();
        assert_eq!(config.server.command, "python");
        assert_eq!(config.server.args, vec!["-m", "tool_server", "--stdio"]);
        assert_eq!(config.server.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(config.server.working_directory.as_deref(), Some("/srv"));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.capabilities, ClientCapabilities::default());
        assert_eq!(config.protocol_version, "2024-11-05");
    }

    #[test]
    fn build_rejects_missing_command() {
        let err = ClientBuilder::new().build().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn build_rejects_zero_timeout() {
        let err = ClientBuilder::new()
            .with_command("server")
            .with_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
