//! MCP client implementation
//!
//! - `core`: `Client`, connection lifecycle and the live link
//! - `session`: connection phases and negotiated server state
//! - `correlator`: pending requests, ids and timeouts
//! - `router`: the read loop that routes inbound frames
//! - `config`: `ClientConfig` and `ServerConfig`
//! - `builder`: fluent `ClientBuilder`
//! - `retry`: caller-level `RetryPolicy`
//! - `operations`: MCP operations (tools, prompts, resources, health)

pub mod builder;
pub mod config;
pub mod core;
pub(crate) mod correlator;
pub mod operations;
pub mod retry;
pub(crate) mod router;
pub mod session;

pub use builder::ClientBuilder;
pub use config::{ClientConfig, ServerConfig};
pub use self::core::Client;
pub use operations::health::HealthStatus;
pub use retry::RetryPolicy;
pub use session::ConnectionPhase;
