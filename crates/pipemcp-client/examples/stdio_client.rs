//! Connect to an MCP server launched as a child process
//!
//! Starts the given command, runs the handshake, prints the server's
//! catalogs and optionally calls one tool.
//!
//! ```bash
//! cargo run --package pipemcp-client --example stdio_client -- npx -y @modelcontextprotocol/server-everything
//! TOOL=echo TOOL_ARGS='{"message":"hi"}' cargo run --package pipemcp-client --example stdio_client -- my-server
//! ```
//!
//! Set `RUST_LOG=pipemcp_client=debug` to see lifecycle logs and the
//! server's stderr.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use pipemcp_client::handlers::{HandlerResult, ToolListChangedHandler};
use pipemcp_client::{ClientBuilder, RetryPolicy};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct AnnounceToolChanges;

#[async_trait]
impl ToolListChangedHandler for AnnounceToolChanges {
    async fn handle_tool_list_changed(&self) -> HandlerResult<()> {
        eprintln!("[client] server tool list changed");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pipemcp_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut argv = std::env::args().skip(1);
    let Some(command) = argv.next() else {
        bail!("usage: stdio_client <command> [args...]");
    };

    let client = ClientBuilder::new()
        .with_command(command)
        .with_args(argv)
        .with_timeout(Duration::from_secs(30))
        .with_max_retries(2)
        .with_tool_list_changed_handler(Arc::new(AnnounceToolChanges))
        .build()?;

    let policy = RetryPolicy::from_config(client.config());
    let init = client
        .connect_with_retry(&policy)
        .await
        .context("connecting to server")?;
    println!(
        "Connected to {} {} (protocol {})",
        init.server_info.name, init.server_info.version, init.protocol_version
    );
    if let Some(instructions) = &init.instructions {
        println!("Instructions: {instructions}");
    }

    let capabilities = client.server_capabilities().unwrap_or_default();
    if capabilities.tools.is_some() {
        for tool in client.list_tools().await? {
            println!(
                "tool     {:<24} {}",
                tool.name,
                tool.description.as_deref().unwrap_or("")
            );
        }
    }
    if capabilities.prompts.is_some() {
        for prompt in client.list_prompts().await? {
            println!("prompt   {}", prompt.name);
        }
    }
    if capabilities.resources.is_some() {
        for resource in client.list_resources().await? {
            println!("resource {} ({})", resource.uri, resource.name);
        }
    }

    if let Ok(tool) = std::env::var("TOOL") {
        let arguments: Option<HashMap<String, serde_json::Value>> = match std::env::var("TOOL_ARGS") {
            Ok(raw) => Some(serde_json::from_str(&raw).context("TOOL_ARGS must be a JSON object")?),
            Err(_) => None,
        };
        let result = client.call_tool(&tool, arguments).await?;
        if result.is_error() {
            eprintln!("tool reported an error");
        }
        println!("{}", result.all_text());
    }

    let health = client.health_status().await;
    println!(
        "healthy={} latency={:?} pending={}",
        health.healthy, health.latency, health.pending_requests
    );
    if let Some(metrics) = client.metrics() {
        println!(
            "sent {} messages / {} bytes, received {} messages / {} bytes",
            metrics.messages_sent, metrics.bytes_sent, metrics.messages_received, metrics.bytes_received
        );
    }

    client.disconnect().await;
    Ok(())
}
