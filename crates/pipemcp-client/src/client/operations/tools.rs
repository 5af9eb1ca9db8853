//! Tool operations

use std::collections::HashMap;

use pipemcp_protocol::McpResult;
use pipemcp_protocol::methods;
use pipemcp_protocol::types::{CallToolRequest, CallToolResult, ListToolsResult, Tool};

use crate::client::core::{Client, to_params};

impl Client {
    /// List the tools the server offers
    ///
    /// Returns complete tool definitions including their input schemas. The
    /// catalog is fetched on every call; nothing is cached.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pipemcp_client::Client;
    /// # async fn example(client: Client) -> pipemcp_protocol::McpResult<()> {
    /// for tool in client.list_tools().await? {
    ///     println!("{} - {}", tool.name, tool.description.as_deref().unwrap_or("No description"));
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails with a connection error before the handshake has completed.
    pub async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        let response: ListToolsResult = self.request(methods::LIST_TOOLS, None).await?;
        Ok(response.tools)
    }

    /// List only the tool names
    ///
    /// # Errors
    ///
    /// Same as [`Client::list_tools`].
    pub async fn list_tool_names(&self) -> McpResult<Vec<String>> {
        let tools = self.list_tools().await?;
        Ok(tools.into_iter().map(|tool| tool.name).collect())
    }

    /// Call a tool on the server
    ///
    /// `arguments` is sent as an object; `None` sends `{}`. A tool that
    /// reports its own failure still returns `Ok` with
    /// [`CallToolResult::is_error`] set.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pipemcp_client::Client;
    /// # use std::collections::HashMap;
    /// # async fn example(client: Client) -> pipemcp_protocol::McpResult<()> {
    /// let mut args = HashMap::new();
    /// args.insert("message".to_string(), serde_json::json!("hi"));
    ///
    /// let result = client.call_tool("echo", Some(args)).await?;
    /// println!("{}", result.all_text());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails with a protocol error if the server rejects the call, a timeout
    /// if it does not answer in time, or a connection error before the
    /// handshake has completed.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<HashMap<String, serde_json::Value>>,
    ) -> McpResult<CallToolResult> {
        let request = CallToolRequest {
            name: name.to_string(),
            arguments: Some(arguments.unwrap_or_default()),
            meta: None,
        };
        let params = to_params(methods::CALL_TOOL, &request)?;
        self.request(methods::CALL_TOOL, Some(params)).await
    }
}
