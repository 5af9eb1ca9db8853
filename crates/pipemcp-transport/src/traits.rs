//! The seams between the client and whatever carries its frames.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;

use crate::codec::JsonLineCodec;
use crate::error::TransportResult;
use crate::metrics::TransportMetrics;

/// How long `close` waits for the writer before giving up on it.
pub(crate) const WRITER_RELEASE_TIMEOUT: Duration = Duration::from_millis(500);

/// Type-erased read half
pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;

/// Type-erased write half
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Decoded inbound frames, one JSON text per item.
pub type FrameStream = FramedRead<BoxedRead, JsonLineCodec>;

/// Write side of an open connection to an MCP server.
///
/// Reading is not part of this trait: the launch hands the inbound
/// [`FrameStream`] to the caller, who drives it from a single read loop.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Writes one frame. `frame` must not contain a newline.
    async fn send(&self, frame: String) -> TransportResult<()>;

    /// Releases the write side and stops the peer. Safe to call repeatedly,
    /// and bounded even while a write is stuck on a peer that stopped reading.
    async fn close(&self) -> TransportResult<()>;

    /// Whether frames can still be written.
    async fn is_alive(&self) -> bool;

    /// Human-readable description of the peer, for logs.
    fn endpoint(&self) -> String;

    /// Counter snapshot.
    fn metrics(&self) -> TransportMetrics;
}

/// Everything a launch produces.
pub struct LaunchedTransport {
    /// Write handle
    pub transport: Arc<dyn Transport>,
    /// Inbound frames
    pub frames: FrameStream,
    /// Diagnostic byte stream (a child's stderr), logged but never parsed
    pub diagnostics: Option<BoxedRead>,
}

impl fmt::Debug for LaunchedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedTransport")
            .field("transport", &self.transport)
            .field("buffered", &self.frames.read_buffer().len())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

/// Opens a fresh connection each time it is called.
#[async_trait]
pub trait TransportFactory: Send + Sync + fmt::Debug {
    /// Starts the peer and returns its handles.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransportError::ConfigurationError`] for unusable
    /// configuration and [`crate::TransportError::ConnectionFailed`] when the
    /// peer cannot be started.
    async fn launch(&self) -> TransportResult<LaunchedTransport>;
}
