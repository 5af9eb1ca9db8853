//! Child process transport.
//!
//! Spawns an MCP server with stdin, stdout and stderr piped. Frames are
//! written to stdin through a `FramedWrite`; stdout is handed to the caller as
//! a [`FrameStream`] and stderr as a raw diagnostic stream.
//!
//! # Interior Mutability Pattern
//!
//! - **tokio::sync::Mutex** for the child handle and the stdin writer (held across `.await`)
//! - **AtomicMetrics** for lock-free counter updates
//! - **AtomicBool** closed flag, readable without waiting on a stuck writer
//!
//! # Shutdown
//!
//! [`ChildProcessTransport::close`] closes stdin, sends SIGTERM (a plain kill
//! on non-Unix targets), waits up to `shutdown_timeout` for the process to
//! exit, then force-kills it and reaps it within a fixed bound. A process that
//! already exited is an expected outcome, not an error.
//!
//! Closing stdin is itself bounded: when a write is stuck because the server
//! stopped reading, the writer is abandoned and the signal goes out anyway.
//! The stuck write then fails once the process is gone.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex as TokioMutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{DEFAULT_MAX_FRAME_LENGTH, JsonLineCodec};
use crate::error::{TransportError, TransportResult};
use crate::metrics::{AtomicMetrics, TransportMetrics};
use crate::traits::{BoxedRead, LaunchedTransport, Transport, TransportFactory, WRITER_RELEASE_TIMEOUT};

/// Upper bound on reaping the process after a force kill.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for child process transport
#[derive(Debug, Clone)]
pub struct ChildProcessConfig {
    /// Command to execute
    pub command: String,

    /// Arguments to pass to the command
    pub args: Vec<String>,

    /// Working directory for the process
    pub working_directory: Option<String>,

    /// Environment variables added to the inherited environment
    pub environment: HashMap<String, String>,

    /// How long to wait for exit after SIGTERM before force-killing
    pub shutdown_timeout: Duration,

    /// Maximum frame size in bytes, both directions
    pub max_message_size: usize,

    /// Whether to kill the process on drop
    pub kill_on_drop: bool,
}

impl Default for ChildProcessConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
            shutdown_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_FRAME_LENGTH,
            kill_on_drop: true,
        }
    }
}

impl ChildProcessConfig {
    /// Configuration for `command` with `args`
    pub fn new(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    fn endpoint(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// A running MCP server process.
#[derive(Debug)]
pub struct ChildProcessTransport {
    config: ChildProcessConfig,
    /// Child process handle; `None` once terminated.
    child: TokioMutex<Option<Child>>,
    /// Framed stdin; `None` once closed.
    writer: TokioMutex<Option<FramedWrite<ChildStdin, JsonLineCodec>>>,
    /// Set by `close`; later writes are refused.
    closed: AtomicBool,
    metrics: Arc<AtomicMetrics>,
}

impl ChildProcessTransport {
    /// Spawn the process described by `config`.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConfigurationError`] for an empty command,
    /// [`TransportError::ConnectionFailed`] if the process cannot be spawned,
    /// its pipes are missing, or it exits immediately.
    pub async fn spawn(config: ChildProcessConfig) -> TransportResult<LaunchedTransport> {
        if config.command.trim().is_empty() {
            return Err(TransportError::ConfigurationError(
                "Command cannot be empty".to_string(),
            ));
        }

        info!("Starting child process: {} {:?}", config.command, config.args);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(config.kill_on_drop);

        if let Some(ref wd) = config.working_directory {
            cmd.current_dir(wd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn child process {}: {}", config.command, e);
            TransportError::ConnectionFailed(format!(
                "Failed to spawn process '{}': {e}",
                config.command
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::ConnectionFailed("Failed to get stdin handle".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::ConnectionFailed("Failed to get stdout handle".to_string())
        })?;
        let stderr = child.stderr.take();

        if let Ok(Some(status)) = child.try_wait() {
            error!("Child process exited early with status: {}", status);
            return Err(TransportError::ConnectionFailed(format!(
                "Process exited early: {status}"
            )));
        }

        debug!("Child process started with pid {:?}", child.id());

        let metrics = Arc::new(AtomicMetrics::new());
        let max = config.max_message_size;
        let frames = FramedRead::new(
            Box::new(stdout) as BoxedRead,
            JsonLineCodec::with_max_length(max).with_metrics(Arc::clone(&metrics)),
        );
        let writer = FramedWrite::new(stdin, JsonLineCodec::with_max_length(max));

        let transport = Arc::new(Self {
            config,
            child: TokioMutex::new(Some(child)),
            writer: TokioMutex::new(Some(writer)),
            closed: AtomicBool::new(false),
            metrics,
        });

        Ok(LaunchedTransport {
            transport,
            frames,
            diagnostics: stderr.map(|s| Box::new(s) as BoxedRead),
        })
    }

    /// OS process id, while the process is tracked
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(Child::id)
    }

    /// Close stdin so a well-behaved server sees EOF. Never waits more than
    /// [`WRITER_RELEASE_TIMEOUT`] per step.
    async fn release_stdin(&self) {
        let Ok(mut guard) = timeout(WRITER_RELEASE_TIMEOUT, self.writer.lock()).await else {
            warn!("Child stdin is blocked by a pending write, signalling without closing it");
            return;
        };
        if let Some(mut writer) = guard.take() {
            match timeout(WRITER_RELEASE_TIMEOUT, writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Closing child stdin: {}", e),
                Err(_) => warn!("Flushing child stdin stalled, dropping it"),
            }
        }
    }

    /// Two-phase termination: SIGTERM, bounded wait, then force kill.
    async fn terminate(&self) {
        self.release_stdin().await;

        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Child process already exited with status: {}", status);
                return;
            }
            Ok(None) => {}
            Err(e) => debug!("Failed to poll child process status: {}", e),
        }

        if !send_sigterm(&child)
            && let Err(e) = child.start_kill()
        {
            debug!("Failed to signal child process: {}", e);
        }

        match timeout(self.config.shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => info!("Child process exited with status: {}", status),
            Ok(Err(e)) => debug!("Failed to wait for child process exit: {}", e),
            Err(_) => {
                warn!(
                    "Child process did not exit within {:?}, forcing kill",
                    self.config.shutdown_timeout
                );
                if let Err(e) = child.start_kill() {
                    debug!("Force kill failed: {}", e);
                }
                match timeout(KILL_REAP_TIMEOUT, child.wait()).await {
                    Ok(Ok(status)) => info!("Child process killed, status: {}", status),
                    Ok(Err(e)) => debug!("Failed to reap killed child process: {}", e),
                    Err(_) => warn!("Child process could not be reaped after kill"),
                }
            }
        }
    }
}

/// Sends SIGTERM. Returns `false` when the caller should fall back to a kill.
#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => {
            debug!("Sent SIGTERM to child process {}", pid);
            true
        }
        Err(e) => {
            debug!("SIGTERM to child process {} failed: {}", pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}

#[async_trait]
impl Transport for ChildProcessTransport {
    async fn send(&self, frame: String) -> TransportResult<()> {
        let len = frame.len();
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionLost("stdin is closed".to_string()));
        }
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionLost("stdin is closed".to_string()))?;

        writer.send(frame).await.map_err(|e| {
            error!("Failed to write to child stdin: {}", e);
            TransportError::SendFailed(e.to_string())
        })?;

        self.metrics.record_sent(len);
        trace!("Sent {} bytes to child process", len);
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        info!("Stopping child process: {}", self.config.command);
        self.closed.store(true, Ordering::Release);
        self.terminate().await;
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut guard = self.child.lock().await;
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

impl Drop for ChildProcessTransport {
    fn drop(&mut self) {
        if self.config.kill_on_drop
            && let Ok(mut guard) = self.child.try_lock()
            && let Some(child) = guard.as_mut()
        {
            let _ = child.start_kill();
        }
    }
}

/// Launches a fresh [`ChildProcessTransport`] per connection.
#[derive(Debug, Clone)]
pub struct ChildProcessFactory {
    config: ChildProcessConfig,
}

impl ChildProcessFactory {
    /// Factory for `config`
    pub fn new(config: ChildProcessConfig) -> Self {
        Self { config }
    }

    /// The process configuration
    pub fn config(&self) -> &ChildProcessConfig {
        &self.config
    }
}

#[async_trait]
impl TransportFactory for ChildProcessFactory {
    async fn launch(&self) -> TransportResult<LaunchedTransport> {
        ChildProcessTransport::spawn(self.config.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_child_process_config_default() {
        let config = ChildProcessConfig::default();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.max_message_size, 10 * 1024 * 1024);
        assert!(config.kill_on_drop);
        assert!(config.environment.is_empty());
    }

    #[test]
    fn endpoint_joins_command_and_args() {
        let config = ChildProcessConfig::new("node", ["server.js", "--stdio"]);
        assert_eq!(config.endpoint(), "node server.js --stdio");
        assert_eq!(ChildProcessConfig::new("srv", Vec::<String>::new()).endpoint(), "srv");
    }

    #[tokio::test]
    async fn test_empty_command_error() {
        let result = ChildProcessTransport::spawn(ChildProcessConfig::default()).await;
        match result {
            Err(TransportError::ConfigurationError(msg)) => {
                assert!(msg.contains("Command cannot be empty"));
            }
            other => panic!("Expected ConfigurationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_connection_failure() {
        let config = ChildProcessConfig::new("/nonexistent/pipemcp-test-server", Vec::<String>::new());
        let result = ChildProcessFactory::new(config).launch().await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cat_echoes_frames_and_terminates() {
        let launched = ChildProcessTransport::spawn(ChildProcessConfig::new("cat", Vec::<String>::new()))
            .await
            .unwrap();
        let LaunchedTransport {
            transport,
            mut frames,
            ..
        } = launched;

        transport
            .send(r#"{"jsonrpc":"2.0","method":"hello"}"#.to_string())
            .await
            .unwrap();
        let echoed = frames.next().await.unwrap().unwrap();
        assert_eq!(echoed, r#"{"jsonrpc":"2.0","method":"hello"}"#);

        let metrics = transport.metrics();
        assert_eq!(metrics.messages_sent, 1);
        assert_eq!(metrics.messages_received, 1);

        assert!(transport.is_alive().await);
        transport.close().await.unwrap();
        assert!(!transport.is_alive().await);
        transport.close().await.unwrap();

        let err = transport.send("{}".to_string()).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_ignored_escalates_to_kill() {
        let config = ChildProcessConfig {
            shutdown_timeout: Duration::from_millis(200),
            ..ChildProcessConfig::new("sh", ["-c", "trap '' TERM; while true; do sleep 1; done"])
        };
        let launched = ChildProcessTransport::spawn(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        launched.transport.close().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!launched.transport.is_alive().await);
    }
}
