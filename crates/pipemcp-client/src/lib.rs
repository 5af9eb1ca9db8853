//! # pipemcp Client
//!
//! MCP (Model Context Protocol) client for tool servers that run as child
//! processes and speak newline-delimited JSON-RPC over their stdin/stdout.
//!
//! ## Features
//!
//! - Child process supervision with SIGTERM/SIGKILL escalation on disconnect
//! - Request/response correlation by id, out-of-order responses supported
//! - Per-request timeouts that never leak pending entries
//! - Capability negotiation through the `initialize` handshake
//! - Phase-gated operations that fail fast before any I/O
//! - Handlers for server notifications (catalog changes, log records)
//! - Health reporting and transport counters
//!
//! ## Architecture
//!
//! ```text
//! Application Layer
//!        ↓
//! Client API (this crate)
//!        ↓
//! Protocol Layer (pipemcp-protocol)
//!        ↓
//! Transport Layer (pipemcp-transport)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pipemcp_client::{Client, ClientConfig, ServerConfig};
//!
//! # async fn example() -> pipemcp_protocol::McpResult<()> {
//! let config = ClientConfig::for_server(ServerConfig::new("my-mcp-server", ["--stdio"]));
//! let client = Client::new(config);
//!
//! client.connect().await?;
//! let init = client.initialize().await?;
//! println!("Connected to: {}", init.server_info.name);
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {} - {}", tool.name, tool.description.as_deref().unwrap_or("No description"));
//! }
//!
//! let health = client.health_status().await;
//! println!("healthy: {}, pending: {}", health.healthy, health.pending_requests);
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod handlers;
pub mod prelude;

pub use client::{
    Client, ClientBuilder, ClientConfig, ConnectionPhase, HealthStatus, RetryPolicy, ServerConfig,
};
pub use handlers::{
    HandlerError, HandlerRegistry, HandlerResult, LogHandler, LoggingNotification,
    PromptListChangedHandler, ResourceListChangedHandler, ToolListChangedHandler,
    TracingLogHandler,
};

pub use pipemcp_protocol::types::{
    CallToolResult, ClientCapabilities, GetPromptResult, InitializeResult, Prompt,
    ReadResourceResult, Resource, ServerCapabilities, Tool,
};
pub use pipemcp_protocol::{ErrorKind, Implementation, McpError, McpResult};
pub use pipemcp_transport::TransportMetrics;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
