//! Inbound routing and feature operations against an in-memory server.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ready_client, test_config};
use pipemcp_client::handlers::{
    HandlerError, HandlerResult, LogHandler, LoggingNotification, PromptListChangedHandler,
    ResourceListChangedHandler, ToolListChangedHandler,
};
use pipemcp_client::{ConnectionPhase, ErrorKind};
use pipemcp_protocol::types::{LogLevel, ResourceContent, Role};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;

#[derive(Debug)]
struct Events(mpsc::UnboundedSender<String>);

#[async_trait]
impl ToolListChangedHandler for Events {
    async fn handle_tool_list_changed(&self) -> HandlerResult<()> {
        let _ = self.0.send("tools".to_string());
        Ok(())
    }
}

#[async_trait]
impl PromptListChangedHandler for Events {
    async fn handle_prompt_list_changed(&self) -> HandlerResult<()> {
        let _ = self.0.send("prompts".to_string());
        Ok(())
    }
}

#[async_trait]
impl ResourceListChangedHandler for Events {
    async fn handle_resource_list_changed(&self) -> HandlerResult<()> {
        let _ = self.0.send("resources".to_string());
        Err(HandlerError::Generic {
            message: "refresh failed".to_string(),
        })
    }
}

#[async_trait]
impl LogHandler for Events {
    async fn handle_log(&self, log: LoggingNotification) -> HandlerResult<()> {
        assert_eq!(log.level, LogLevel::Warning);
        let _ = self.0.send(format!("log:{}", log.data));
        Ok(())
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("handler was not invoked")
        .expect("channel closed")
}

#[tokio::test]
async fn list_changed_notifications_reach_handlers() {
    let (client, server) = ready_client(test_config()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let events = Arc::new(Events(tx));
    client.set_tool_list_changed_handler(events.clone());
    client.set_prompt_list_changed_handler(events.clone());
    client.set_resource_list_changed_handler(events.clone());
    client.set_log_handler(events);

    server.push(r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#);
    assert_eq!(next_event(&mut rx).await, "tools");

    server.push(r#"{"jsonrpc":"2.0","method":"notifications/prompts/list_changed"}"#);
    assert_eq!(next_event(&mut rx).await, "prompts");

    // A failing handler does not disturb the read loop.
    server.push(r#"{"jsonrpc":"2.0","method":"notifications/resources/list_changed"}"#);
    assert_eq!(next_event(&mut rx).await, "resources");

    server.push(
        r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"warning","data":"low disk"}}"#,
    );
    assert_eq!(next_event(&mut rx).await, r#"log:"low disk""#);

    assert!(client.ping().await.is_ok());
}

#[tokio::test]
async fn unhandled_and_unknown_notifications_are_ignored() {
    let (client, server) = ready_client(test_config()).await;
    server.push(r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#);
    server.push(r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{"progress":1}}"#);
    server.push(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":{"k":1}}}"#);

    assert_eq!(client.list_tool_names().await.unwrap(), vec!["echo", "hang"]);
    assert_eq!(client.phase(), ConnectionPhase::Ready);
}

#[tokio::test]
async fn server_ping_is_answered() {
    let (_client, server) = ready_client(test_config()).await;
    server.push(r#"{"jsonrpc":"2.0","id":"srv-1","method":"ping"}"#);

    let frames = server
        .wait_for(|f| f.iter().any(|m| m["id"] == "srv-1"))
        .await;
    let reply = frames.iter().find(|m| m["id"] == "srv-1").unwrap();
    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["result"], json!({}));
}

#[tokio::test]
async fn other_server_requests_get_method_not_found() {
    let (_client, server) = ready_client(test_config()).await;
    server.push(r#"{"jsonrpc":"2.0","id":41,"method":"sampling/createMessage","params":{}}"#);

    let frames = server.wait_for(|f| f.iter().any(|m| m["id"] == 41)).await;
    let reply = frames.iter().find(|m| m["id"] == 41).unwrap();
    assert_eq!(reply["error"]["code"], -32601);
    assert!(reply.get("result").is_none());
}

#[tokio::test]
async fn malformed_frames_and_unknown_ids_are_dropped() {
    let (client, server) = ready_client(test_config()).await;
    for garbage in [
        "this is not json",
        "[1,2,3]",
        r#"{"id":1,"result":{}}"#,
        r#"{"jsonrpc":"1.0","id":1,"result":{}}"#,
        r#"{"jsonrpc":"2.0"}"#,
        r#"{"jsonrpc":"2.0","id":999,"result":{"stray":true}}"#,
        "",
    ] {
        server.push(garbage);
    }

    let result = client.call_tool("echo", Some(HashMap::from([("message".to_string(), json!("still here"))]))).await;
    assert_eq!(result.unwrap().all_text(), "still here");

    let health = client.health_status().await;
    assert!(health.healthy);
    assert_eq!(health.pending_requests, 0);
}

#[tokio::test]
async fn tools_round_trip() {
    let (client, server) = ready_client(test_config()).await;

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].description.as_deref(), Some("Echo a message"));

    let mut args = HashMap::new();
    args.insert("message".to_string(), json!("hi"));
    let result = client.call_tool("echo", Some(args)).await.unwrap();
    assert!(!result.is_error());
    assert_eq!(result.content[0].as_text(), Some("hi"));

    let sent = server.received();
    let call = sent.iter().find(|f| f["method"] == "tools/call").unwrap();
    assert_eq!(call["params"], json!({"name": "echo", "arguments": {"message": "hi"}}));

    let err = client.call_tool("missing", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Protocol);
    assert_eq!(err.code, Some(-32602));
    assert_eq!(err.message, "unknown tool");
    assert_eq!(err.method.as_deref(), Some("tools/call"));
}

#[tokio::test]
async fn prompts_round_trip() {
    let (client, _server) = ready_client(test_config()).await;

    let prompts = client.list_prompts().await.unwrap();
    assert_eq!(prompts[0].name, "review");

    let args = HashMap::from([("language".to_string(), "rust".to_string())]);
    let rendered = client.get_prompt("review", Some(args)).await.unwrap();
    assert_eq!(rendered.description.as_deref(), Some("Code review"));
    assert_eq!(rendered.messages[0].role, Role::User);
    assert_eq!(rendered.messages[0].content.as_text(), Some("Review this rust"));
}

#[tokio::test]
async fn resources_round_trip() {
    let (client, _server) = ready_client(test_config()).await;

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources[0].uri, "file:///notes.txt");

    let read = client.read_resource("file:///notes.txt").await.unwrap();
    match &read.contents[0] {
        ResourceContent::Text(text) => assert_eq!(text.text, "hello"),
        other => panic!("expected text contents, got {other:?}"),
    }
    assert_eq!(read.contents[0].uri(), "file:///notes.txt");
}

#[tokio::test]
async fn notifications_can_be_sent_once_connected() {
    let (client, server) = common::connected_client(test_config()).await;
    client
        .send_notification("notifications/roots/list_changed", None)
        .await
        .unwrap();
    let frames = server.wait_for(|f| !f.is_empty()).await;
    assert_eq!(frames[0]["method"], "notifications/roots/list_changed");
    assert!(frames[0].get("id").is_none());

    client.disconnect().await;
    let err = client
        .send_notification("notifications/roots/list_changed", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Connection);
}

#[tokio::test]
async fn metrics_count_traffic() {
    let (client, _server) = ready_client(test_config()).await;
    client.ping().await.unwrap();

    let metrics = client.metrics().unwrap();
    // initialize, initialized, ping
    assert_eq!(metrics.messages_sent, 3);
    assert_eq!(metrics.messages_received, 2);
    assert!(metrics.bytes_sent > 0);
}
