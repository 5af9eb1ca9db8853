//! Connection utilities: ping, raw requests, notifications and retry

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use pipemcp_protocol::types::{InitializeResult, PingResult};
use pipemcp_protocol::{McpResult, methods};

use crate::client::core::Client;
use crate::client::retry::RetryPolicy;

impl Client {
    /// Send a `ping` and wait for the server to answer
    ///
    /// # Errors
    ///
    /// Fails with a connection error before the handshake has completed, or
    /// a timeout if the server does not answer within the request timeout.
    pub async fn ping(&self) -> McpResult<PingResult> {
        self.request(methods::PING, None).await
    }

    pub(crate) async fn ping_within(&self, timeout: Duration) -> McpResult<()> {
        let link = self.ready_link(methods::PING)?;
        link.correlator
            .request(methods::PING, None, Some(timeout))
            .await
            .map(drop)
    }

    /// Send a notification to the server. No response is expected.
    ///
    /// Allowed as soon as the pipes are open, before the handshake.
    ///
    /// # Errors
    ///
    /// Fails with a connection error when disconnected or when the write
    /// fails.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let link = self.connected_link(method)?;
        link.correlator.notify(method, params).await
    }

    /// Send an arbitrary request and return its raw `result`
    ///
    /// For methods this crate has no typed wrapper for. `timeout` overrides
    /// the configured request timeout for this call only.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pipemcp_client::Client;
    /// # use std::time::Duration;
    /// # async fn example(client: Client) -> pipemcp_protocol::McpResult<()> {
    /// let templates = client
    ///     .request_raw("resources/templates/list", None, Some(Duration::from_secs(2)))
    ///     .await?;
    /// println!("{templates}");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Same as the typed operations: connection, timeout or protocol errors.
    pub async fn request_raw(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> McpResult<Value> {
        let link = self.ready_link(method)?;
        link.correlator.request(method, params, timeout).await
    }

    /// Connect and initialize, retrying transient failures per `policy`
    ///
    /// Between attempts the half-open connection is torn down, so every
    /// attempt starts a fresh server process. Protocol and configuration
    /// errors are returned immediately.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pipemcp_client::{Client, ClientConfig, RetryPolicy, ServerConfig};
    /// # async fn example() -> pipemcp_protocol::McpResult<()> {
    /// let config = ClientConfig::for_server(ServerConfig::new("my-server", Vec::<String>::new()));
    /// let policy = RetryPolicy::from_config(&config);
    /// let client = Client::new(config);
    /// let init = client.connect_with_retry(&policy).await?;
    /// println!("connected to {}", init.server_info.name);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// The error of the last attempt.
    pub async fn connect_with_retry(&self, policy: &RetryPolicy) -> McpResult<InitializeResult> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match self.connect().await {
                Ok(()) => self.initialize().await,
                Err(e) => Err(e),
            };

            let error = match outcome {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Connected after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            self.disconnect().await;
            if !policy.should_retry(&error, attempt) {
                if attempt > 1 {
                    warn!("Giving up after {} attempts: {}", attempt, error);
                }
                return Err(error);
            }

            let delay = policy.calculate_delay(attempt);
            warn!(
                "Connection attempt {}/{} failed: {}. Retrying in {:?}",
                attempt, policy.max_attempts, error, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
