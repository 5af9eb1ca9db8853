//! Core Client implementation
//!
//! `Client` is a cheaply cloneable handle over `Arc<ClientInner>`. All clones
//! share one session and, while connected, one [`Link`]:
//!
//! - **`parking_lot::Mutex<Session>`** for the phase and negotiated state
//! - **`parking_lot::Mutex<Option<Arc<Link>>>`** for the live connection
//! - **`tokio::sync::Mutex<()>`** serializing connect against disconnect
//!
//! Lock order is session, then link. Neither is held across an await.
//!
//! A `Link` is the transport handle, its correlator and the read tasks of one
//! connection. Disconnect tears it down for good; a later `connect()` starts
//! a new process and a new link. Request ids come from a counter owned by the
//! client, so they keep increasing across reconnects.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pipemcp_protocol::types::{InitializeRequest, InitializeResult, ServerCapabilities};
use pipemcp_protocol::{Implementation, McpError, McpResult, SUPPORTED_VERSIONS, methods};
use pipemcp_transport::{ChildProcessFactory, LaunchedTransport, Transport, TransportFactory};

use super::config::ClientConfig;
use super::correlator::Correlator;
use super::router;
use super::session::{ConnectionPhase, Session};
use crate::handlers::HandlerRegistry;

/// Reason given to requests still pending when the client disconnects
const CLIENT_DISCONNECTED: &str = "client disconnected";

/// How long teardown waits for the read tasks after cancelling them
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// One live connection: transport, correlator and read tasks.
#[derive(Debug)]
pub(crate) struct Link {
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) transport: Arc<dyn Transport>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Link {
    fn start(
        launched: LaunchedTransport,
        next_id: Arc<AtomicU64>,
        timeout: Duration,
        handlers: Arc<Mutex<HandlerRegistry>>,
    ) -> Arc<Self> {
        let LaunchedTransport {
            transport,
            frames,
            diagnostics,
        } = launched;
        let correlator = Arc::new(Correlator::new(Arc::clone(&transport), next_id, timeout));
        let shutdown = CancellationToken::new();

        let mut tasks = vec![tokio::spawn(router::read_loop(
            frames,
            Arc::clone(&correlator),
            handlers,
            shutdown.clone(),
        ))];
        if let Some(stderr) = diagnostics {
            tasks.push(tokio::spawn(router::diagnostics_loop(
                stderr,
                transport.endpoint(),
                shutdown.clone(),
            )));
        }

        Arc::new(Self {
            correlator,
            transport,
            shutdown,
            tasks: Mutex::new(tasks),
        })
    }

    /// Reject pending requests, stop the read tasks and close the transport.
    async fn shutdown(&self) {
        let rejected = self.correlator.cancel_all(CLIENT_DISCONNECTED);
        if rejected > 0 {
            debug!("Rejected {} pending request(s) on disconnect", rejected);
        }
        self.shutdown.cancel();

        if let Err(e) = self.transport.close().await {
            debug!("Closing {}: {}", self.transport.endpoint(), e);
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await.is_err() {
                warn!("Read task did not stop in time, aborting it");
                abort.abort();
            }
        }
    }
}

/// Shared client state
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    pub(crate) session: Mutex<Session>,
    pub(crate) link: Mutex<Option<Arc<Link>>>,
    lifecycle: tokio::sync::Mutex<()>,
    pub(crate) handlers: Arc<Mutex<HandlerRegistry>>,
    next_id: Arc<AtomicU64>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Last handle gone without disconnect(): reject waiters and stop the
        // loops. The child is killed when its transport drops.
        if let Some(link) = self.link.get_mut().take() {
            debug!("Last Client reference dropped while connected");
            link.correlator.cancel_all(CLIENT_DISCONNECTED);
            link.shutdown.cancel();
        }
    }
}

/// MCP client for a tool server running as a child process
///
/// # Clone Pattern
///
/// Cloning is cheap and all clones share the same connection:
///
/// ```rust,no_run
/// use pipemcp_client::{Client, ClientConfig, ServerConfig};
///
/// # async fn example() -> pipemcp_protocol::McpResult<()> {
/// let client = Client::new(ClientConfig::for_server(ServerConfig::new("my-server", ["--stdio"])));
/// client.connect().await?;
/// client.initialize().await?;
///
/// let worker = client.clone();
/// tokio::spawn(async move {
///     worker.list_tools().await.ok();
/// });
/// # Ok(())
/// # }
/// ```
///
/// # Lifecycle
///
/// `connect()` starts the server, `initialize()` runs the handshake and
/// `disconnect()` tears everything down. Feature calls fail fast with a
/// connection error until the handshake has completed.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.inner.config.server.command)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client that launches `config.server` as a child process on connect
    ///
    /// Nothing is started until [`Client::connect`] is called.
    pub fn new(config: ClientConfig) -> Self {
        let factory = Arc::new(ChildProcessFactory::new(config.child_process()));
        Self::with_factory(config, factory)
    }

    /// Client that obtains its connection from `factory`
    ///
    /// Used to attach to servers over other byte channels, and by tests to
    /// talk to in-memory servers.
    pub fn with_factory(config: ClientConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                factory,
                session: Mutex::new(Session::default()),
                link: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
                handlers: Arc::new(Mutex::new(HandlerRegistry::new())),
                next_id: Arc::new(AtomicU64::new(1)),
            }),
        }
    }

    /// Start the server and its read loops.
    ///
    /// # Errors
    ///
    /// Fails with a connection error if the client is not disconnected or the
    /// server cannot be started; in the latter case the phase is back to
    /// `disconnected`.
    pub async fn connect(&self) -> McpResult<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.session.lock().begin_connect()?;

        info!("Connecting to MCP server: {}", self.inner.config.server.command);
        let launched = match self.inner.factory.launch().await {
            Ok(launched) => launched,
            Err(e) => {
                self.inner.session.lock().reset();
                error!("Failed to start MCP server: {}", e);
                return Err(e.into());
            }
        };

        let link = Link::start(
            launched,
            Arc::clone(&self.inner.next_id),
            self.inner.config.timeout,
            Arc::clone(&self.inner.handlers),
        );
        let endpoint = link.transport.endpoint();
        {
            let mut session = self.inner.session.lock();
            *self.inner.link.lock() = Some(link);
            session.connected();
        }
        info!("Connected to {}", endpoint);
        Ok(())
    }

    /// Run the `initialize` handshake with parameters built from configuration.
    ///
    /// # Errors
    ///
    /// Fails if not connected, if a handshake is already in flight, or if the
    /// server rejects or does not answer the request. A failed handshake
    /// leaves the client `connected` so it can be retried.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        self.handshake(self.default_initialize_request()).await
    }

    /// Run the `initialize` handshake with caller-supplied parameters.
    ///
    /// # Errors
    ///
    /// Same as [`Client::initialize`].
    pub async fn initialize_with(&self, request: InitializeRequest) -> McpResult<InitializeResult> {
        self.handshake(request).await
    }

    fn default_initialize_request(&self) -> InitializeRequest {
        InitializeRequest {
            protocol_version: self.inner.config.protocol_version.clone(),
            capabilities: self.inner.config.capabilities.clone(),
            client_info: self.inner.config.client_info.clone(),
            meta: None,
        }
    }

    async fn handshake(&self, request: InitializeRequest) -> McpResult<InitializeResult> {
        let link = {
            let mut session = self.inner.session.lock();
            session.begin_initialize()?;
            match self.inner.link.lock().clone() {
                Some(link) => link,
                None => {
                    session.fail_initialize();
                    return Err(McpError::connection("not connected")
                        .with_method(methods::INITIALIZE));
                }
            }
        };

        info!(
            "Initializing session (protocol version {})",
            request.protocol_version
        );
        let outcome = async {
            let params = to_params(methods::INITIALIZE, &request)?;
            let value = link
                .correlator
                .request(methods::INITIALIZE, Some(params), None)
                .await?;
            from_result::<InitializeResult>(methods::INITIALIZE, value)
        }
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                let mut session = self.inner.session.lock();
                if self.is_current(&link) {
                    session.fail_initialize();
                }
                warn!("Initialize failed: {}", e);
                return Err(e);
            }
        };

        let stored = {
            let mut session = self.inner.session.lock();
            self.is_current(&link) && session.finish_initialize(&result)
        };
        if !stored {
            return Err(McpError::connection("disconnected during initialize")
                .with_method(methods::INITIALIZE));
        }

        if !SUPPORTED_VERSIONS.contains(&result.protocol_version.as_str()) {
            warn!(
                "Server negotiated unsupported protocol version {}",
                result.protocol_version
            );
        }

        if let Err(e) = link.correlator.notify(methods::INITIALIZED, None).await {
            warn!("Failed to send initialized notification: {}", e);
        }

        info!(
            "Session ready: {} {} (protocol {})",
            result.server_info.name, result.server_info.version, result.protocol_version
        );
        Ok(result)
    }

    /// Tear the connection down. Safe to call in any phase, any number of
    /// times, concurrently with in-flight requests.
    ///
    /// Pending requests are rejected with a connection error, the read loops
    /// stop and the server process is terminated (SIGTERM, then SIGKILL once
    /// `shutdown_timeout` has passed).
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let (previous, link) = {
            let mut session = self.inner.session.lock();
            let previous = session.phase;
            session.reset();
            (previous, self.inner.link.lock().take())
        };

        match link {
            Some(link) => {
                info!("Disconnecting from {} (phase: {})", link.transport.endpoint(), previous);
                link.shutdown().await;
                info!("Disconnected");
            }
            None => debug!("Disconnect while already disconnected"),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ConnectionPhase {
        self.inner.session.lock().phase
    }

    /// Whether the handshake has completed
    pub fn is_ready(&self) -> bool {
        self.phase() == ConnectionPhase::Ready
    }

    /// Server identity from the handshake
    pub fn server_info(&self) -> Option<Implementation> {
        self.inner.session.lock().server_info.clone()
    }

    /// Server capabilities from the handshake
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.inner.session.lock().server_capabilities.clone()
    }

    /// Protocol version chosen by the server
    pub fn protocol_version(&self) -> Option<String> {
        self.inner.session.lock().protocol_version.clone()
    }

    /// Usage instructions sent by the server, if any
    pub fn instructions(&self) -> Option<String> {
        self.inner.session.lock().instructions.clone()
    }

    /// Configuration this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    fn is_current(&self, link: &Arc<Link>) -> bool {
        self.inner
            .link
            .lock()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, link))
    }

    /// Live link, if the handshake has completed
    pub(crate) fn ready_link(&self, operation: &str) -> McpResult<Arc<Link>> {
        let session = self.inner.session.lock();
        session.require_ready(operation)?;
        self.inner
            .link
            .lock()
            .clone()
            .ok_or_else(|| McpError::connection("not connected").with_method(operation))
    }

    /// Live link, if pipes to the server are open
    pub(crate) fn connected_link(&self, operation: &str) -> McpResult<Arc<Link>> {
        let session = self.inner.session.lock();
        session.require_connected(operation)?;
        self.inner
            .link
            .lock()
            .clone()
            .ok_or_else(|| McpError::connection("not connected").with_method(operation))
    }

    /// Live link in any phase, for health reporting
    pub(crate) fn current_link(&self) -> Option<Arc<Link>> {
        self.inner.link.lock().clone()
    }

    /// Send a ready-gated request and decode its result.
    pub(crate) async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<R> {
        let link = self.ready_link(method)?;
        let value = link.correlator.request(method, params, None).await?;
        from_result(method, value)
    }
}

pub(crate) fn to_params<P: Serialize + ?Sized>(method: &str, params: &P) -> McpResult<Value> {
    serde_json::to_value(params).map_err(|e| McpError::from(e).with_method(method))
}

fn from_result<R: DeserializeOwned>(method: &str, value: Value) -> McpResult<R> {
    serde_json::from_value(value).map_err(|e| McpError::from(e).with_method(method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipemcp_protocol::ErrorKind;
    use pipemcp_transport::RawStreamFactory;

    #[tokio::test]
    async fn fresh_client_is_disconnected() {
        let client = Client::with_factory(ClientConfig::default(), Arc::new(RawStreamFactory::new()));
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
        assert!(!client.is_ready());
        assert!(client.server_capabilities().is_none());
        assert!(client.server_info().is_none());
        assert!(client.current_link().is_none());
    }

    #[tokio::test]
    async fn failed_launch_reverts_to_disconnected() {
        let client = Client::with_factory(ClientConfig::default(), Arc::new(RawStreamFactory::new()));
        let err = client.connect().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn initialize_requires_connection() {
        let client = Client::with_factory(ClientConfig::default(), Arc::new(RawStreamFactory::new()));
        let err = client.initialize().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert!(err.message.contains("disconnected"));
    }

    #[tokio::test]
    async fn disconnect_when_idle_is_a_no_op() {
        let client = Client::with_factory(ClientConfig::default(), Arc::new(RawStreamFactory::new()));
        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
    }

    #[test]
    fn default_handshake_uses_configuration() {
        let mut config = ClientConfig::default();
        config.protocol_version = "2025-03-26".to_string();
        config.client_info = Implementation::new("orchestrator", "2.1.0");
        let client = Client::with_factory(config, Arc::new(RawStreamFactory::new()));

        let request = client.default_initialize_request();
        assert_eq!(request.protocol_version, "2025-03-26");
        assert_eq!(request.client_info.name, "orchestrator");
        assert!(request.meta.is_none());
    }
}
