//! In-memory MCP server for client tests.
//!
//! The server runs on one end of a `tokio::io::duplex` pipe; the client gets
//! the other end through a `RawStreamFactory`. Every inbound frame is
//! recorded, requests are answered by a responder closure, and tests can push
//! arbitrary raw frames (notifications, server requests, garbage) at the
//! client.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pipemcp_client::{Client, ClientConfig};
use pipemcp_transport::RawStreamFactory;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// What the fake server does with one request
pub enum Reply {
    Result(Value),
    Error(i64, &'static str),
    /// Never answer
    Silent,
    /// Close both pipes
    Hangup,
}

pub type Responder = Box<dyn Fn(&str, &Value) -> Reply + Send + Sync>;

pub struct FakeServer {
    received: Arc<Mutex<Vec<Value>>>,
    outbound: mpsc::UnboundedSender<String>,
}

impl FakeServer {
    /// Start a server and return the factory that connects to it.
    pub fn start(responder: Responder) -> (Arc<RawStreamFactory>, Self) {
        let factory = Arc::new(RawStreamFactory::new());
        let server = Self::attach(&factory, responder);
        (factory, server)
    }

    /// Start another server reachable through the next launch of `factory`.
    pub fn attach(factory: &RawStreamFactory, responder: Responder) -> Self {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        factory.push(client_read, client_write);

        let received = Arc::new(Mutex::new(Vec::new()));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let log = Arc::clone(&received);

        tokio::spawn(async move {
            let (server_read, mut server_write) = tokio::io::split(server_io);
            let mut lines = BufReader::new(server_read).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Ok(Some(line)) = line else { return };
                        let Ok(frame) = serde_json::from_str::<Value>(&line) else { continue };
                        log.lock().push(frame.clone());

                        let (Some(id), Some(method)) = (frame.get("id"), frame.get("method").and_then(Value::as_str)) else {
                            continue;
                        };
                        let params = frame.get("params").cloned().unwrap_or(Value::Null);
                        let response = match responder(method, &params) {
                            Reply::Result(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                            Reply::Error(code, message) => json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "error": {"code": code, "message": message}
                            }),
                            Reply::Silent => continue,
                            Reply::Hangup => return,
                        };
                        let mut bytes = response.to_string().into_bytes();
                        bytes.push(b'\n');
                        if server_write.write_all(&bytes).await.is_err() {
                            return;
                        }
                    }
                    Some(raw) = outbound_rx.recv() => {
                        let mut bytes = raw.into_bytes();
                        bytes.push(b'\n');
                        if server_write.write_all(&bytes).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Self { received, outbound }
    }

    /// Push a raw line to the client
    pub fn push(&self, raw: impl Into<String>) {
        let _ = self.outbound.send(raw.into());
    }

    /// Every frame received so far
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    /// Frames that carried a method, in arrival order
    pub fn methods(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|f| f.get("method").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Wait until `predicate` holds for the received frames
    pub async fn wait_for(&self, predicate: impl Fn(&[Value]) -> bool) -> Vec<Value> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let frames = self.received();
                if predicate(&frames) {
                    return frames;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("server did not receive the expected frames in time")
    }
}

/// Responder for a well-behaved tool server.
///
/// Tools: `echo` returns its `message` argument (empty when absent), `hang` never answers,
/// `fail` is rejected with `-32602`, `crash` closes the pipes.
pub fn tool_server() -> Responder {
    Box::new(|method, params| match method {
        "initialize" => Reply::Result(initialize_result()),
        "ping" => Reply::Result(json!({})),
        "tools/list" => Reply::Result(json!({
            "tools": [
                {"name": "echo", "description": "Echo a message", "inputSchema": {"type": "object"}},
                {"name": "hang", "inputSchema": {"type": "object"}}
            ]
        })),
        "tools/call" => match params["name"].as_str() {
            Some("echo") => Reply::Result(json!({
                "content": [{"type": "text", "text": params["arguments"]["message"].as_str().unwrap_or("")}]
            })),
            Some("hang") => Reply::Silent,
            Some("crash") => Reply::Hangup,
            _ => Reply::Error(-32602, "unknown tool"),
        },
        "prompts/list" => Reply::Result(json!({
            "prompts": [{"name": "review", "arguments": [{"name": "language", "required": true}]}]
        })),
        "prompts/get" => Reply::Result(json!({
            "description": "Code review",
            "messages": [{
                "role": "user",
                "content": {"type": "text", "text": format!("Review this {}", params["arguments"]["language"].as_str().unwrap_or("code"))}
            }]
        })),
        "resources/list" => Reply::Result(json!({
            "resources": [{"uri": "file:///notes.txt", "name": "notes", "mimeType": "text/plain"}]
        })),
        "resources/read" => Reply::Result(json!({
            "contents": [{"uri": params["uri"], "mimeType": "text/plain", "text": "hello"}]
        })),
        _ => Reply::Error(-32601, "Method not found"),
    })
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2025-06-18",
        "capabilities": {
            "tools": {"listChanged": true},
            "prompts": {},
            "resources": {"subscribe": false}
        },
        "serverInfo": {"name": "fake-server", "version": "1.2.3"},
        "instructions": "Call echo to test."
    })
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

/// Client connected to a fresh `tool_server`, handshake not yet done
pub async fn connected_client(config: ClientConfig) -> (Client, FakeServer) {
    let (factory, server) = FakeServer::start(tool_server());
    let client = Client::with_factory(config, factory);
    client.connect().await.expect("connect");
    (client, server)
}

/// Client connected to a fresh `tool_server` with the handshake done
pub async fn ready_client(config: ClientConfig) -> (Client, FakeServer) {
    let (client, server) = connected_client(config).await;
    client.initialize().await.expect("initialize");
    (client, server)
}
