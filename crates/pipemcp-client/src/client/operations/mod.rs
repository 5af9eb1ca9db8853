//! Client-initiated MCP operations
//!
//! - `tools`: list and call tools
//! - `prompts`: list and render prompt templates
//! - `resources`: list and read resources
//! - `connection`: ping, raw requests, notifications and connect-with-retry
//! - `health`: health report and transport counters
//! - `handlers`: registration of notification handlers

pub mod connection;
pub mod handlers;
pub mod health;
pub mod prompts;
pub mod resources;
pub mod tools;
