//! Inbound frame routing
//!
//! The read loop is the only consumer of the server's output. Each frame is
//! classified and sent to one place:
//!
//! - **Responses** settle the matching pending request
//! - **Notifications** go to the registered handlers, each on its own task
//! - **Requests** from the server get an answer (`ping`) or method-not-found
//!
//! Malformed frames are logged and skipped. When the output ends without a
//! shutdown having been requested, every pending request is rejected.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use pipemcp_protocol::types::LoggingNotification;
use pipemcp_protocol::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, methods,
};
use pipemcp_transport::{BoxedRead, FrameStream};

use super::correlator::Correlator;
use crate::handlers::HandlerRegistry;

/// Reason given to requests still pending when the server's output ends
pub(crate) const SERVER_CLOSED: &str = "server closed the connection";

/// Server notifications the client acts on
#[derive(Debug)]
enum ServerEvent {
    ToolListChanged,
    PromptListChanged,
    ResourceListChanged,
    Log(LoggingNotification),
}

impl ServerEvent {
    fn classify(notification: JsonRpcNotification) -> Option<Self> {
        match notification.method.as_str() {
            methods::TOOLS_LIST_CHANGED => Some(Self::ToolListChanged),
            methods::PROMPTS_LIST_CHANGED => Some(Self::PromptListChanged),
            methods::RESOURCES_LIST_CHANGED => Some(Self::ResourceListChanged),
            methods::LOG_MESSAGE => {
                let params = notification.params.unwrap_or_default();
                match serde_json::from_value(params) {
                    Ok(log) => Some(Self::Log(log)),
                    Err(e) => {
                        warn!("Ignoring malformed log notification: {}", e);
                        None
                    }
                }
            }
            other => {
                debug!("Ignoring unhandled server notification: {}", other);
                None
            }
        }
    }

    async fn dispatch(self, handlers: HandlerRegistry) {
        let (name, result) = match self {
            Self::ToolListChanged => ("tools/list_changed", handlers.handle_tool_list_changed().await),
            Self::PromptListChanged => (
                "prompts/list_changed",
                handlers.handle_prompt_list_changed().await,
            ),
            Self::ResourceListChanged => (
                "resources/list_changed",
                handlers.handle_resource_list_changed().await,
            ),
            Self::Log(log) => ("message", handlers.handle_log(log).await),
        };
        if let Err(e) = result {
            warn!("Handler for {} notification failed: {}", name, e);
        }
    }
}

/// Consume `frames` until the stream ends or `shutdown` fires.
pub(crate) async fn read_loop(
    mut frames: FrameStream,
    correlator: Arc<Correlator>,
    handlers: Arc<Mutex<HandlerRegistry>>,
    shutdown: CancellationToken,
) {
    debug!("Read loop started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Read loop stopping on shutdown");
                return;
            }
            next = frames.next() => match next {
                Some(Ok(frame)) => route_frame(&frame, &correlator, &handlers),
                Some(Err(e)) => {
                    warn!("Reading server output failed: {}", e);
                    break;
                }
                None => {
                    info!("Server output closed");
                    break;
                }
            }
        }
    }

    if !shutdown.is_cancelled() {
        let rejected = correlator.cancel_all(SERVER_CLOSED);
        if rejected > 0 {
            warn!("Rejected {} pending request(s): {}", rejected, SERVER_CLOSED);
        }
    }
}

fn route_frame(frame: &str, correlator: &Arc<Correlator>, handlers: &Arc<Mutex<HandlerRegistry>>) {
    let message = match JsonRpcMessage::parse(frame) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed frame ({}): {}", e, truncate(frame, 200));
            return;
        }
    };

    match message {
        JsonRpcMessage::Response(response) => correlator.complete(response),
        JsonRpcMessage::Notification(notification) => {
            trace!("<- {} (notification)", notification.method);
            if let Some(event) = ServerEvent::classify(notification) {
                let handlers = handlers.lock().clone();
                tokio::spawn(event.dispatch(handlers));
            }
        }
        JsonRpcMessage::Request(request) => {
            debug!(
                "Server-initiated request: method={}, id={}",
                request.method, request.id
            );
            let correlator = Arc::clone(correlator);
            tokio::spawn(async move {
                let response = answer(&request);
                if let Err(e) = correlator.respond(response).await {
                    warn!("Failed to answer server {} request: {}", request.method, e);
                }
            });
        }
    }
}

fn answer(request: &JsonRpcRequest) -> JsonRpcResponse {
    match request.method.as_str() {
        methods::PING => JsonRpcResponse::success(json!({}), request.id.clone()),
        other => JsonRpcResponse::error_response(
            JsonRpcError::method_not_found(other),
            request.id.clone(),
        ),
    }
}

fn truncate(frame: &str, max: usize) -> &str {
    match frame.char_indices().nth(max) {
        Some((idx, _)) => &frame[..idx],
        None => frame,
    }
}

/// Forward each line of the server's stderr to tracing at debug level.
pub(crate) async fn diagnostics_loop(
    stderr: BoxedRead,
    endpoint: String,
    shutdown: CancellationToken,
) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => debug!(target: "pipemcp_client::server_stderr", "[{}] {}", endpoint, line),
                Ok(None) => return,
                Err(e) => {
                    debug!("Reading stderr of {} failed: {}", endpoint, e);
                    return;
                }
            }
        }
    }
}
