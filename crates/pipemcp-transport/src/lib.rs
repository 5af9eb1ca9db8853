//! # pipemcp Transport
//!
//! Byte-level plumbing between the client and an MCP server:
//!
//! - [`ChildProcessTransport`] spawns the server with piped stdio, writes
//!   frames to its stdin and terminates it with SIGTERM, a bounded wait, then
//!   a force kill.
//! - [`JsonLineCodec`] turns the server's stdout into newline-delimited text
//!   frames for `tokio_util`'s `FramedRead`/`FramedWrite`.
//! - [`RawStreamTransport`] runs the same framing over any
//!   `AsyncRead`/`AsyncWrite` pair, which is how in-memory servers are wired up.
//!
//! Everything reachable from the client goes through the [`Transport`] and
//! [`TransportFactory`] traits.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod child_process;
pub mod codec;
pub mod error;
pub mod metrics;
pub mod raw;
pub mod traits;

pub use child_process::{ChildProcessConfig, ChildProcessFactory, ChildProcessTransport};
pub use codec::{DEFAULT_MAX_FRAME_LENGTH, JsonLineCodec};
pub use error::{TransportError, TransportResult};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use raw::{RawStreamFactory, RawStreamTransport};
pub use traits::{BoxedRead, BoxedWrite, FrameStream, LaunchedTransport, Transport, TransportFactory};
