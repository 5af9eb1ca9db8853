//! Prompt operations

use std::collections::HashMap;

use pipemcp_protocol::McpResult;
use pipemcp_protocol::methods;
use pipemcp_protocol::types::{GetPromptRequest, GetPromptResult, ListPromptsResult, Prompt};

use crate::client::core::{Client, to_params};

impl Client {
    /// List the prompt templates the server offers
    ///
    /// # Errors
    ///
    /// Fails with a connection error before the handshake has completed.
    pub async fn list_prompts(&self) -> McpResult<Vec<Prompt>> {
        let response: ListPromptsResult = self.request(methods::LIST_PROMPTS, None).await?;
        Ok(response.prompts)
    }

    /// Render a prompt template
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pipemcp_client::Client;
    /// # use std::collections::HashMap;
    /// # async fn example(client: Client) -> pipemcp_protocol::McpResult<()> {
    /// let mut args = HashMap::new();
    /// args.insert("language".to_string(), "rust".to_string());
    ///
    /// let prompt = client.get_prompt("code_review", Some(args)).await?;
    /// for message in prompt.messages {
    ///     println!("{:?}: {:?}", message.role, message.content.as_text());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails with a protocol error for an unknown prompt or bad arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        let request = GetPromptRequest {
            name: name.to_string(),
            arguments,
        };
        let params = to_params(methods::GET_PROMPT, &request)?;
        self.request(methods::GET_PROMPT, Some(params)).await
    }
}
