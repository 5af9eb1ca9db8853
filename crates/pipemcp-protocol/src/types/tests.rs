use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;

#[test]
fn initialize_request_uses_camel_case_keys() {
    let req = InitializeRequest {
        protocol_version: "2025-06-18".to_string(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation::new("test-client", "1.0.0"),
        meta: None,
    };
    assert_eq!(
        serde_json::to_value(&req).unwrap(),
        json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        })
    );
}

#[test]
fn initialize_result_tolerates_missing_capabilities() {
    let result: InitializeResult = serde_json::from_value(json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": {"name": "srv", "version": "0.1"}
    }))
    .unwrap();
    assert_eq!(result.capabilities, ServerCapabilities::default());
    assert_eq!(result.server_info.name, "srv");
}

#[test]
fn server_capability_flags() {
    let caps: ServerCapabilities = serde_json::from_value(json!({
        "tools": {"listChanged": true},
        "resources": {"subscribe": true},
        "logging": {}
    }))
    .unwrap();
    assert!(caps.tools_list_changed());
    assert!(!caps.prompts_list_changed());
    assert!(!caps.resources_list_changed());
    assert!(caps.resources_subscribe());
    assert!(caps.logging.is_some());
}

#[test]
fn tool_without_schema_defaults_to_object() {
    let tool: Tool = serde_json::from_value(json!({"name": "echo"})).unwrap();
    assert_eq!(tool.input_schema.schema_type, "object");
}

#[test]
fn call_tool_result_collects_text() {
    let result: CallToolResult = serde_json::from_value(json!({
        "content": [
            {"type": "text", "text": "hello"},
            {"type": "image", "data": "AAAA", "mimeType": "image/png"},
            {"type": "text", "text": "world"}
        ],
        "isError": false
    }))
    .unwrap();
    assert_eq!(result.all_text(), "hello\nworld");
    assert!(!result.is_error());
}

#[test]
fn resource_contents_are_told_apart() {
    let result: ReadResourceResult = serde_json::from_value(json!({
        "contents": [
            {"uri": "file:///a.txt", "text": "hi"},
            {"uri": "file:///b.bin", "blob": "AAEC", "mimeType": "application/octet-stream"}
        ]
    }))
    .unwrap();
    assert!(matches!(result.contents[0], ResourceContent::Text(_)));
    assert!(matches!(result.contents[1], ResourceContent::Blob(_)));
    assert_eq!(result.contents[1].uri(), "file:///b.bin");
}

#[test]
fn log_levels_are_lowercase() {
    let n: LoggingNotification = serde_json::from_value(json!({
        "level": "warning",
        "data": "disk almost full",
        "logger": "fs"
    }))
    .unwrap();
    assert_eq!(n.level, LogLevel::Warning);
    assert!(LogLevel::Error > LogLevel::Warning);
}
