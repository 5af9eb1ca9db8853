//! Framing over an arbitrary reader/writer pair.
//!
//! Used to attach a client to a server that is already running on some other
//! byte channel, and to wire clients to in-memory servers over
//! `tokio::io::duplex` in tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::SinkExt;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as TokioMutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, trace, warn};

use crate::codec::{DEFAULT_MAX_FRAME_LENGTH, JsonLineCodec};
use crate::error::{TransportError, TransportResult};
use crate::metrics::{AtomicMetrics, TransportMetrics};
use crate::traits::{
    BoxedRead, BoxedWrite, LaunchedTransport, Transport, TransportFactory, WRITER_RELEASE_TIMEOUT,
};

/// Write side of a raw stream connection.
pub struct RawStreamTransport {
    endpoint: String,
    writer: TokioMutex<Option<FramedWrite<BoxedWrite, JsonLineCodec>>>,
    closed: AtomicBool,
    metrics: Arc<AtomicMetrics>,
}

impl fmt::Debug for RawStreamTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawStreamTransport")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.closed)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl RawStreamTransport {
    /// Frame `reader` and `writer` with the given frame limit.
    pub fn from_raw<R, W>(
        reader: R,
        writer: W,
        max_message_size: usize,
        endpoint: impl Into<String>,
    ) -> LaunchedTransport
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let metrics = Arc::new(AtomicMetrics::new());
        let frames = FramedRead::new(
            Box::new(reader) as BoxedRead,
            JsonLineCodec::with_max_length(max_message_size).with_metrics(Arc::clone(&metrics)),
        );
        let writer = FramedWrite::new(
            Box::new(writer) as BoxedWrite,
            JsonLineCodec::with_max_length(max_message_size),
        );

        LaunchedTransport {
            transport: Arc::new(Self {
                endpoint: endpoint.into(),
                writer: TokioMutex::new(Some(writer)),
                closed: AtomicBool::new(false),
                metrics,
            }),
            frames,
            diagnostics: None,
        }
    }
}

#[async_trait]
impl Transport for RawStreamTransport {
    async fn send(&self, frame: String) -> TransportResult<()> {
        let len = frame.len();
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionLost("transport is closed".to_string()));
        }
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionLost("transport is closed".to_string()))?;

        writer.send(frame).await.map_err(|e| {
            error!("Failed to write frame to {}: {}", self.endpoint, e);
            TransportError::SendFailed(e.to_string())
        })?;

        self.metrics.record_sent(len);
        trace!("Sent {} bytes to {}", len, self.endpoint);
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::Release);
        // A writer stuck on a peer that stopped reading is left to its own
        // caller's deadline; its frames are refused from here on.
        let Ok(mut guard) = timeout(WRITER_RELEASE_TIMEOUT, self.writer.lock()).await else {
            warn!("Writer for {} is busy, abandoning it", self.endpoint);
            return Ok(());
        };
        if let Some(mut writer) = guard.take() {
            match timeout(WRITER_RELEASE_TIMEOUT, writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Closing {}: {}", self.endpoint, e),
                Err(_) => warn!("Flushing {} on close stalled, dropping the writer", self.endpoint),
            }
        }
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

/// Hands out pre-supplied stream pairs, one per launch.
pub struct RawStreamFactory {
    streams: Mutex<VecDeque<(BoxedRead, BoxedWrite)>>,
    max_message_size: usize,
}

impl fmt::Debug for RawStreamFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawStreamFactory")
            .field("remaining", &self.streams.lock().len())
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

impl Default for RawStreamFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RawStreamFactory {
    /// Empty factory; launches fail until a pair is pushed
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(VecDeque::new()),
            max_message_size: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Factory holding one reader/writer pair
    pub fn single<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let factory = Self::new();
        factory.push(reader, writer);
        factory
    }

    /// Frame size limit applied to every launched pair
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Queue another pair for a later launch
    pub fn push<R, W>(&self, reader: R, writer: W)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.streams
            .lock()
            .push_back((Box::new(reader), Box::new(writer)));
    }

    /// Pairs not yet launched
    pub fn remaining(&self) -> usize {
        self.streams.lock().len()
    }
}

#[async_trait]
impl TransportFactory for RawStreamFactory {
    async fn launch(&self) -> TransportResult<LaunchedTransport> {
        let (reader, writer) = self.streams.lock().pop_front().ok_or_else(|| {
            TransportError::ConnectionFailed("no stream pair available".to_string())
        })?;
        Ok(RawStreamTransport::from_raw(
            reader,
            writer,
            self.max_message_size,
            "raw-stream",
        ))
    }
}
