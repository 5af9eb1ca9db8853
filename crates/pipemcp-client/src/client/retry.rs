//! Caller-level retry with exponential backoff and jitter
//!
//! The client never retries on its own. [`Client::connect_with_retry`]
//! applies a [`RetryPolicy`] to the whole connect-and-initialize sequence.
//!
//! [`Client::connect_with_retry`]: crate::Client::connect_with_retry

use std::time::Duration;

use serde::{Deserialize, Serialize};

use pipemcp_protocol::McpError;

use super::config::ClientConfig;

/// Backoff schedule for repeated connection attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub delay: Duration,
    /// Growth factor applied to the delay after every retry
    pub backoff_multiplier: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Jitter factor (0.0 - 1.0) to avoid thundering herd
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl RetryPolicy {
    /// Policy derived from `max_retries` and `retry_delay`
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            delay: config.retry_delay,
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.delay;
        }

        let delay_ms =
            self.delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);

        let jitter = 1.0 + (fastrand::f64() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay_ms = delay_ms * jitter;

        let capped_delay_ms = jittered_delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay_ms.max(0.0) as u64)
    }

    /// Whether another attempt should follow failed attempt number `attempt`
    pub fn should_retry(&self, error: &McpError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}
