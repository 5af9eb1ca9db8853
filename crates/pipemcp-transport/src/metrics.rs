//! Lock-free transport counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of a transport's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMetrics {
    /// Total bytes written, excluding the frame delimiter.
    pub bytes_sent: u64,
    /// Total bytes of decoded inbound frames.
    pub bytes_received: u64,
    /// Frames written.
    pub messages_sent: u64,
    /// Frames decoded.
    pub messages_received: u64,
    /// Inbound lines dropped for being oversized or not UTF-8.
    pub frames_dropped: u64,
    /// Inbound bytes received but not yet terminated by a newline.
    pub buffered_bytes: u64,
}

/// Atomic counters shared between a transport and its frame decoder.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    /// Total bytes sent (atomic counter).
    pub bytes_sent: AtomicU64,
    /// Total bytes received (atomic counter).
    pub bytes_received: AtomicU64,
    /// Total messages sent (atomic counter).
    pub messages_sent: AtomicU64,
    /// Total messages received (atomic counter).
    pub messages_received: AtomicU64,
    /// Inbound lines discarded by the decoder (atomic counter).
    pub frames_dropped: AtomicU64,
    /// Undecoded bytes in the read buffer (gauge).
    pub buffered_bytes: AtomicU64,
}

impl AtomicMetrics {
    /// Creates a new `AtomicMetrics` instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outbound frame of `len` bytes.
    pub fn record_sent(&self, len: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Records one inbound frame of `len` bytes.
    pub fn record_received(&self, len: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Records one discarded inbound line.
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Sets the undecoded-bytes gauge.
    pub fn set_buffered(&self, len: usize) {
        self.buffered_bytes.store(len as u64, Ordering::Relaxed);
    }

    /// Creates a `TransportMetrics` snapshot from the current atomic values.
    pub fn snapshot(&self) -> TransportMetrics {
        TransportMetrics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            buffered_bytes: self.buffered_bytes.load(Ordering::Relaxed),
        }
    }
}
