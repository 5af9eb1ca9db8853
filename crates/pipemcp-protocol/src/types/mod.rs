//! MCP payload types exchanged once a pipe is open.
//!
//! # Module Organization
//!
//! - [`core`] - Identity, roles, pagination cursors
//! - [`capabilities`] - Client/server capability negotiation
//! - [`initialization`] - Handshake request and result
//! - [`content`] - Content blocks returned by tools and prompts
//! - [`tools`] - Tool listing and invocation
//! - [`prompts`] - Prompt templates
//! - [`resources`] - Resource listing and reads
//! - [`logging`] - Server log notifications
//! - [`ping`] - Liveness probe

pub mod capabilities;
pub mod content;
pub mod core;
pub mod initialization;
pub mod logging;
pub mod ping;
pub mod prompts;
pub mod resources;
pub mod tools;

pub use capabilities::*;
pub use content::*;
pub use self::core::*;
pub use initialization::*;
pub use logging::*;
pub use ping::*;
pub use prompts::*;
pub use resources::*;
pub use tools::*;

#[cfg(test)]
mod tests;
