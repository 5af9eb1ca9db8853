//! Prelude module for convenient imports
//!
//! # Example
//!
//! ```rust,no_run
//! use pipemcp_client::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let client = ClientBuilder::new().with_command("my-mcp-server").build()?;
//!     client.connect().await?;
//!     client.initialize().await?;
//!
//!     let tools = client.list_tools().await?;
//!     println!("Found {} tools", tools.len());
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

pub use crate::{CRATE_NAME, VERSION};

pub use crate::{
    CallToolResult, Client, ClientBuilder, ClientCapabilities, ClientConfig, ConnectionPhase,
    ErrorKind, GetPromptResult, HandlerError, HandlerResult, HealthStatus, Implementation,
    InitializeResult, LogHandler, LoggingNotification, McpError, McpResult, Prompt,
    PromptListChangedHandler, ReadResourceResult, Resource, ResourceListChangedHandler,
    RetryPolicy, ServerCapabilities, ServerConfig, Tool, ToolListChangedHandler,
};

pub use async_trait::async_trait;
pub use serde_json::{Value, json};
