//! Liveness probe types.

use serde::{Deserialize, Serialize};

use super::core::Meta;

/// Result of a `ping` request. Servers normally answer with `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    /// Optional metadata for the result.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}
