//! # pipemcp Protocol
//!
//! Wire-level types for talking MCP (Model Context Protocol) over a pair of
//! pipes: the JSON-RPC 2.0 envelope, explicit frame classification, the
//! unified [`McpError`] and the catalog types (tools, prompts, resources)
//! exchanged once a session is initialized.
//!
//! ## Frame classification
//!
//! Inbound frames are decoded into a [`jsonrpc::JsonRpcMessage`] with an
//! explicit three-way branch rather than untagged deserialization:
//!
//! ```rust
//! use pipemcp_protocol::jsonrpc::JsonRpcMessage;
//!
//! let frame = r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#;
//! match JsonRpcMessage::parse(frame) {
//!     Ok(JsonRpcMessage::Notification(n)) => assert_eq!(n.method, "notifications/tools/list_changed"),
//!     other => panic!("unexpected: {other:?}"),
//! }
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

pub mod error;
pub mod jsonrpc;
pub mod types;

pub use error::{ErrorKind, McpError, McpResult};
pub use jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    MalformedFrame, MessageId,
};
pub use types::Implementation;

/// Protocol revision the client offers during the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol revisions this crate knows how to speak.
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Method names used on the wire.
pub mod methods {
    /// Handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Sent by the client once the handshake succeeded
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Liveness probe
    pub const PING: &str = "ping";
    /// List tools
    pub const LIST_TOOLS: &str = "tools/list";
    /// Invoke a tool
    pub const CALL_TOOL: &str = "tools/call";
    /// List prompt templates
    pub const LIST_PROMPTS: &str = "prompts/list";
    /// Render a prompt template
    pub const GET_PROMPT: &str = "prompts/get";
    /// List resources
    pub const LIST_RESOURCES: &str = "resources/list";
    /// Read a resource
    pub const READ_RESOURCE: &str = "resources/read";
    /// Server tool catalog changed
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    /// Server prompt catalog changed
    pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    /// Server resource catalog changed
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    /// Server log record
    pub const LOG_MESSAGE: &str = "notifications/message";
}
