//! Handlers for server-initiated notifications
//!
//! A server tells the client when its catalogs change and may forward log
//! records. The read loop dispatches these to whatever handlers are
//! registered on the client; unhandled notifications are logged and dropped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pipemcp_client::handlers::{HandlerResult, ToolListChangedHandler};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct RefreshTools;
//!
//! #[async_trait]
//! impl ToolListChangedHandler for RefreshTools {
//!     async fn handle_tool_list_changed(&self) -> HandlerResult<()> {
//!         eprintln!("tool catalog is stale, refetching");
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use pipemcp_protocol::types::LogLevel;

pub use pipemcp_protocol::types::LoggingNotification;

/// Errors a handler may report back to the dispatcher
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// Notification payload was not what the handler expected
    #[error("Invalid input: {details}")]
    InvalidInput {
        /// What was wrong
        details: String,
    },

    /// Generic handler error
    #[error("Handler error: {message}")]
    Generic {
        /// Error message
        message: String,
    },

    /// Failure in a system the handler talks to
    #[error("External system error: {source}")]
    External {
        /// Underlying error
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for handler operations
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Handles `notifications/tools/list_changed`
#[async_trait]
pub trait ToolListChangedHandler: Send + Sync + std::fmt::Debug {
    /// Called when the server's tool catalog changed
    async fn handle_tool_list_changed(&self) -> HandlerResult<()>;
}

/// Handles `notifications/prompts/list_changed`
#[async_trait]
pub trait PromptListChangedHandler: Send + Sync + std::fmt::Debug {
    /// Called when the server's prompt catalog changed
    async fn handle_prompt_list_changed(&self) -> HandlerResult<()>;
}

/// Handles `notifications/resources/list_changed`
#[async_trait]
pub trait ResourceListChangedHandler: Send + Sync + std::fmt::Debug {
    /// Called when the server's resource catalog changed
    async fn handle_resource_list_changed(&self) -> HandlerResult<()>;
}

/// Handles `notifications/message` log records from the server
///
/// # Examples
///
/// ```rust,no_run
/// use pipemcp_client::handlers::{HandlerResult, LogHandler, LoggingNotification};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct Stderr;
///
/// #[async_trait]
/// impl LogHandler for Stderr {
///     async fn handle_log(&self, log: LoggingNotification) -> HandlerResult<()> {
///         eprintln!("{:?}: {}", log.level, log.data);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait LogHandler: Send + Sync + std::fmt::Debug {
    /// Called for every server log record
    async fn handle_log(&self, log: LoggingNotification) -> HandlerResult<()>;
}

/// Registered notification handlers.
///
/// Cloning is cheap; the read loop works on a clone so that registering a
/// handler never waits on a running one.
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    tool_list_changed: Option<Arc<dyn ToolListChangedHandler>>,
    prompt_list_changed: Option<Arc<dyn PromptListChangedHandler>>,
    resource_list_changed: Option<Arc<dyn ResourceListChangedHandler>>,
    log: Option<Arc<dyn LogHandler>>,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tool list changed handler, replacing any previous one
    pub fn set_tool_list_changed_handler(&mut self, handler: Arc<dyn ToolListChangedHandler>) {
        debug!("Registering tool list changed handler");
        self.tool_list_changed = Some(handler);
    }

    /// Register the prompt list changed handler, replacing any previous one
    pub fn set_prompt_list_changed_handler(&mut self, handler: Arc<dyn PromptListChangedHandler>) {
        debug!("Registering prompt list changed handler");
        self.prompt_list_changed = Some(handler);
    }

    /// Register the resource list changed handler, replacing any previous one
    pub fn set_resource_list_changed_handler(
        &mut self,
        handler: Arc<dyn ResourceListChangedHandler>,
    ) {
        debug!("Registering resource list changed handler");
        self.resource_list_changed = Some(handler);
    }

    /// Register the log handler, replacing any previous one
    pub fn set_log_handler(&mut self, handler: Arc<dyn LogHandler>) {
        debug!("Registering log handler");
        self.log = Some(handler);
    }

    /// Dispatch a tool list change
    pub async fn handle_tool_list_changed(&self) -> HandlerResult<()> {
        match &self.tool_list_changed {
            Some(handler) => handler.handle_tool_list_changed().await,
            None => {
                debug!("No tool list changed handler registered, ignoring notification");
                Ok(())
            }
        }
    }

    /// Dispatch a prompt list change
    pub async fn handle_prompt_list_changed(&self) -> HandlerResult<()> {
        match &self.prompt_list_changed {
            Some(handler) => handler.handle_prompt_list_changed().await,
            None => {
                debug!("No prompt list changed handler registered, ignoring notification");
                Ok(())
            }
        }
    }

    /// Dispatch a resource list change
    pub async fn handle_resource_list_changed(&self) -> HandlerResult<()> {
        match &self.resource_list_changed {
            Some(handler) => handler.handle_resource_list_changed().await,
            None => {
                debug!("No resource list changed handler registered, ignoring notification");
                Ok(())
            }
        }
    }

    /// Dispatch a server log record; falls back to [`TracingLogHandler`]
    pub async fn handle_log(&self, log: LoggingNotification) -> HandlerResult<()> {
        match &self.log {
            Some(handler) => handler.handle_log(log).await,
            None => TracingLogHandler.handle_log(log).await,
        }
    }
}

/// Default log handler that routes server logs to tracing
#[derive(Debug)]
pub struct TracingLogHandler;

#[async_trait]
impl LogHandler for TracingLogHandler {
    async fn handle_log(&self, log: LoggingNotification) -> HandlerResult<()> {
        let logger_prefix = log.logger.as_deref().unwrap_or("server");

        // data is arbitrary JSON; strings print without quotes
        let message = match &log.data {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match log.level {
            LogLevel::Error => error!("[{}] {}", logger_prefix, message),
            LogLevel::Warning => warn!("[{}] {}", logger_prefix, message),
            LogLevel::Info => info!("[{}] {}", logger_prefix, message),
            LogLevel::Debug => debug!("[{}] {}", logger_prefix, message),
            LogLevel::Notice => info!("[{}] [NOTICE] {}", logger_prefix, message),
            LogLevel::Critical => error!("[{}] [CRITICAL] {}", logger_prefix, message),
            LogLevel::Alert => error!("[{}] [ALERT] {}", logger_prefix, message),
            LogLevel::Emergency => error!("[{}] [EMERGENCY] {}", logger_prefix, message),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl ToolListChangedHandler for Counter {
        async fn handle_tool_list_changed(&self) -> HandlerResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl PromptListChangedHandler for Failing {
        async fn handle_prompt_list_changed(&self) -> HandlerResult<()> {
            Err(HandlerError::Generic {
                message: "cache unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn empty_registry_ignores_everything() {
        let registry = HandlerRegistry::new();
        assert!(registry.handle_tool_list_changed().await.is_ok());
        assert!(registry.handle_prompt_list_changed().await.is_ok());
        assert!(registry.handle_resource_list_changed().await.is_ok());
        let log = LoggingNotification {
            level: LogLevel::Warning,
            data: json!("disk almost full"),
            logger: None,
        };
        assert!(registry.handle_log(log).await.is_ok());
    }

    #[tokio::test]
    async fn registered_handler_is_invoked_through_clones() {
        let counter = Arc::new(Counter::default());
        let mut registry = HandlerRegistry::new();
        registry.set_tool_list_changed_handler(counter.clone());

        let snapshot = registry.clone();
        snapshot.handle_tool_list_changed().await.unwrap();
        registry.handle_tool_list_changed().await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let mut registry = HandlerRegistry::new();
        registry.set_prompt_list_changed_handler(Arc::new(Failing));
        let err = registry.handle_prompt_list_changed().await.unwrap_err();
        assert_eq!(err.to_string(), "Handler error: cache unavailable");
    }

    #[test]
    fn external_errors_convert() {
        let source: Box<dyn std::error::Error + Send + Sync> = "db down".into();
        let err = HandlerError::from(source);
        assert!(matches!(err, HandlerError::External { .. }));
        assert_eq!(err.to_string(), "External system error: db down");
    }
}
