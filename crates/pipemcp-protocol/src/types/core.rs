//! Core types shared by every MCP payload.

use serde::{Deserialize, Serialize};

/// Protocol version string, e.g. `"2025-06-18"`
pub type ProtocolVersion = String;

/// Opaque pagination token
pub type Cursor = String;

/// Resource URI
pub type Uri = String;

/// MIME type string
pub type MimeType = String;

/// Arbitrary `_meta` payload
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Name and version of a client or server implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Implementation version
    pub version: String,
}

impl Implementation {
    /// Create an implementation descriptor from name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            version: version.into(),
        }
    }
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            name: "pipemcp-client".to_string(),
            title: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Role in conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User role
    User,
    /// Assistant role
    Assistant,
}

/// Optional client hints attached to content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    /// Intended audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    /// Relative importance, 0.0 to 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// ISO 8601 timestamp of last modification
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}
