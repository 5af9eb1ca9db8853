//! Notification handler registration

use std::sync::Arc;

use crate::client::core::Client;
use crate::handlers::{
    LogHandler, PromptListChangedHandler, ResourceListChangedHandler, ToolListChangedHandler,
};

impl Client {
    /// Register a handler for `notifications/tools/list_changed`
    ///
    /// Handlers may be registered at any time; they apply to notifications
    /// received afterwards, across reconnects.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use pipemcp_client::{Client, ClientConfig};
    /// use pipemcp_client::handlers::{HandlerResult, ToolListChangedHandler};
    /// use async_trait::async_trait;
    /// use std::sync::Arc;
    ///
    /// #[derive(Debug)]
    /// struct Refetch;
    ///
    /// #[async_trait]
    /// impl ToolListChangedHandler for Refetch {
    ///     async fn handle_tool_list_changed(&self) -> HandlerResult<()> {
    ///         println!("tools changed");
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let client = Client::new(ClientConfig::default());
    /// client.set_tool_list_changed_handler(Arc::new(Refetch));
    /// ```
    pub fn set_tool_list_changed_handler(&self, handler: Arc<dyn ToolListChangedHandler>) {
        self.inner
            .handlers
            .lock()
            .set_tool_list_changed_handler(handler);
    }

    /// Register a handler for `notifications/prompts/list_changed`
    pub fn set_prompt_list_changed_handler(&self, handler: Arc<dyn PromptListChangedHandler>) {
        self.inner
            .handlers
            .lock()
            .set_prompt_list_changed_handler(handler);
    }

    /// Register a handler for `notifications/resources/list_changed`
    pub fn set_resource_list_changed_handler(&self, handler: Arc<dyn ResourceListChangedHandler>) {
        self.inner
            .handlers
            .lock()
            .set_resource_list_changed_handler(handler);
    }

    /// Register a handler for server log records (`notifications/message`)
    ///
    /// Without one, records are re-emitted through `tracing`.
    pub fn set_log_handler(&self, handler: Arc<dyn LogHandler>) {
        self.inner.handlers.lock().set_log_handler(handler);
    }
}
