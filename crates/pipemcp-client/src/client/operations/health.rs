//! Health reporting

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use pipemcp_transport::TransportMetrics;

use crate::client::core::Client;
use crate::client::session::ConnectionPhase;

/// Snapshot of connection health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `true` only when ready and the server answered a ping in time
    pub healthy: bool,
    /// Phase at the time of the check
    pub phase: ConnectionPhase,
    /// Requests awaiting a response
    pub pending_requests: usize,
    /// Bytes of server output received but not yet terminated by a newline
    pub buffered_bytes: u64,
    /// Round trip of the health ping
    pub latency: Option<Duration>,
    /// Why the connection is unhealthy
    pub error: Option<String>,
}

impl Client {
    /// Report connection health. Never fails.
    ///
    /// When ready and the transport still reports its peer alive, a `ping`
    /// bounded by `health_check_timeout` is sent; otherwise no frame is
    /// written and the report is unhealthy.
    pub async fn health_status(&self) -> HealthStatus {
        let phase = self.phase();
        let link = self.current_link();
        let (mut pending_requests, buffered_bytes) = match &link {
            Some(link) => (
                link.correlator.pending_count(),
                link.transport.metrics().buffered_bytes,
            ),
            None => (0, 0),
        };
        let unhealthy = |pending_requests, error: String| HealthStatus {
            healthy: false,
            phase,
            pending_requests,
            buffered_bytes,
            latency: None,
            error: Some(error),
        };

        if phase != ConnectionPhase::Ready {
            return unhealthy(pending_requests, format!("not ready (phase: {phase})"));
        }
        if let Some(link) = &link
            && !link.transport.is_alive().await
        {
            return unhealthy(
                pending_requests,
                format!("{} is no longer running", link.transport.endpoint()),
            );
        }

        let started = Instant::now();
        let outcome = self.ping_within(self.config().health_check_timeout).await;
        let latency = started.elapsed();
        if let Some(link) = self.current_link() {
            pending_requests = link.correlator.pending_count();
        }

        match outcome {
            Ok(()) => HealthStatus {
                healthy: true,
                phase: self.phase(),
                pending_requests,
                buffered_bytes,
                latency: Some(latency),
                error: None,
            },
            Err(e) => {
                debug!("Health check failed: {}", e);
                HealthStatus {
                    phase: self.phase(),
                    ..unhealthy(pending_requests, e.to_string())
                }
            }
        }
    }

    /// Transport counters of the live connection
    pub fn metrics(&self) -> Option<TransportMetrics> {
        self.current_link().map(|link| link.transport.metrics())
    }
}
