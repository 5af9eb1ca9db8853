//! Request/response correlation.
//!
//! Every outbound request gets a fresh id from a counter shared by all
//! connections of one client, and a one-shot channel parked in the pending
//! table. Exactly one party settles each entry: whoever removes it from the
//! table under the lock. That is the read loop on a matching response, the
//! caller on timeout, or [`Correlator::cancel_all`] on teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use pipemcp_protocol::jsonrpc::JsonRpcResponsePayload;
use pipemcp_protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpError, McpResult, MessageId,
};
use pipemcp_transport::Transport;

type Settlement = McpResult<Value>;

#[derive(Debug)]
struct Waiter {
    method: String,
    tx: oneshot::Sender<Settlement>,
}

#[derive(Debug, Default)]
struct PendingTable {
    waiters: HashMap<MessageId, Waiter>,
    /// Set once by `cancel_all`; no entry is inserted afterwards.
    closed: bool,
}

/// Pending-request table plus the write handle it sends through.
#[derive(Debug)]
pub(crate) struct Correlator {
    transport: Arc<dyn Transport>,
    next_id: Arc<AtomicU64>,
    pending: Mutex<PendingTable>,
    default_timeout: Duration,
}

/// Removes the entry when the caller's future is dropped mid-flight.
struct PendingGuard<'a> {
    pending: &'a Mutex<PendingTable>,
    id: &'a MessageId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().waiters.remove(self.id);
    }
}

impl Correlator {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        next_id: Arc<AtomicU64>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            next_id,
            pending: Mutex::new(PendingTable::default()),
            default_timeout,
        }
    }

    fn next_id(&self) -> MessageId {
        MessageId::Number(self.next_id.fetch_add(1, Ordering::SeqCst) as i64)
    }

    /// Send a request and wait for its outcome.
    ///
    /// Resolves with the `result` member, or fails with a protocol error
    /// carrying the server's error object, a timeout naming `timeout` (or the
    /// default), or a connection error if the write fails or the connection
    /// is torn down first. The write and the wait share one deadline, so a
    /// server that stops reading its input cannot hold the caller past it.
    pub(crate) async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> McpResult<Value> {
        let id = self.next_id();
        let frame = serde_json::to_string(&JsonRpcRequest::new(method, params, id.clone()))
            .map_err(|e| McpError::from(e).with_method(method))?;

        let (tx, mut rx) = oneshot::channel();
        {
            let mut table = self.pending.lock();
            if table.closed {
                return Err(McpError::connection("connection is closed").with_method(method));
            }
            table.waiters.insert(
                id.clone(),
                Waiter {
                    method: method.to_string(),
                    tx,
                },
            );
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            id: &id,
        };

        let bound = timeout.unwrap_or(self.default_timeout);
        let deadline = Instant::now() + bound;

        trace!("-> {} (id {})", method, id);
        match timeout_at(deadline, self.transport.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.pending.lock().waiters.remove(&id);
                warn!("Failed to send {} request {}: {}", method, id, e);
                return Err(McpError::from(e).with_method(method));
            }
            Err(_) => {
                self.pending.lock().waiters.remove(&id);
                warn!("Writing {} request {} stalled for {:?}", method, id, bound);
                return Err(McpError::timeout(method, bound));
            }
        }

        match timeout_at(deadline, &mut rx).await {
            Ok(Ok(settlement)) => settlement,
            Ok(Err(_)) => Err(McpError::connection("request abandoned without a response")
                .with_method(method)),
            Err(_) => {
                let removed = self.pending.lock().waiters.remove(&id).is_some();
                if removed {
                    warn!("Request {} ({}) timed out after {:?}", id, method, bound);
                    Err(McpError::timeout(method, bound))
                } else {
                    // Settled between the deadline and the removal attempt.
                    rx.await.unwrap_or_else(|_| {
                        Err(McpError::connection("request abandoned without a response")
                            .with_method(method))
                    })
                }
            }
        }
    }

    /// Send a notification; nothing is registered. The write is bounded by
    /// the default timeout.
    pub(crate) async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let frame = serde_json::to_string(&JsonRpcNotification::new(method, params))
            .map_err(|e| McpError::from(e).with_method(method))?;
        trace!("-> {} (notification)", method);
        self.send_bounded(frame, method).await
    }

    /// Answer a server-initiated request.
    pub(crate) async fn respond(&self, response: JsonRpcResponse) -> McpResult<()> {
        let frame = serde_json::to_string(&response)?;
        self.send_bounded(frame, "response").await
    }

    async fn send_bounded(&self, frame: String, method: &str) -> McpResult<()> {
        match tokio::time::timeout(self.default_timeout, self.transport.send(frame)).await {
            Ok(sent) => sent.map_err(|e| McpError::from(e).with_method(method)),
            Err(_) => {
                warn!("Writing {} stalled for {:?}", method, self.default_timeout);
                Err(McpError::timeout(method, self.default_timeout))
            }
        }
    }

    /// Settle the waiter matching `response`. Unknown ids are logged and dropped.
    pub(crate) fn complete(&self, response: JsonRpcResponse) {
        let Some(id) = response.id else {
            warn!(
                "Received response without id: {:?}",
                response.error().map(|e| &e.message)
            );
            return;
        };

        let Some(waiter) = self.pending.lock().waiters.remove(&id) else {
            warn!("Received response for unknown/expired request ID: {}", id);
            return;
        };

        trace!("<- response for {} (id {})", waiter.method, id);
        let settlement = match response.payload {
            JsonRpcResponsePayload::Success { result } => Ok(result),
            JsonRpcResponsePayload::Error { error } => {
                debug!(
                    "{} (id {}) failed with code {}: {}",
                    waiter.method, id, error.code, error.message
                );
                Err(McpError::protocol(error).with_method(waiter.method))
            }
        };
        if waiter.tx.send(settlement).is_err() {
            debug!("Caller for request {} is gone", id);
        }
    }

    /// Reject every pending request with a connection error and refuse new
    /// ones. Returns how many requests were rejected.
    pub(crate) fn cancel_all(&self, reason: &str) -> usize {
        let drained: Vec<(MessageId, Waiter)> = {
            let mut table = self.pending.lock();
            table.closed = true;
            table.waiters.drain().collect()
        };
        let count = drained.len();
        for (id, waiter) in drained {
            debug!("Rejecting pending {} (id {}): {}", waiter.method, id, reason);
            let _ = waiter
                .tx
                .send(Err(McpError::connection(reason).with_method(waiter.method)));
        }
        count
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().waiters.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }
}
