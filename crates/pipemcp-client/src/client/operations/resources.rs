//! Resource operations

use pipemcp_protocol::McpResult;
use pipemcp_protocol::methods;
use pipemcp_protocol::types::{ListResourcesResult, ReadResourceRequest, ReadResourceResult, Resource};

use crate::client::core::{Client, to_params};

impl Client {
    /// List the resources the server exposes
    ///
    /// # Errors
    ///
    /// Fails with a connection error before the handshake has completed.
    pub async fn list_resources(&self) -> McpResult<Vec<Resource>> {
        let response: ListResourcesResult = self.request(methods::LIST_RESOURCES, None).await?;
        Ok(response.resources)
    }

    /// Read one resource by URI
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pipemcp_client::Client;
    /// # async fn example(client: Client) -> pipemcp_protocol::McpResult<()> {
    /// let result = client.read_resource("file:///etc/motd").await?;
    /// for content in result.contents {
    ///     println!("{}", content.uri());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails with a protocol error if the server cannot read the resource.
    pub async fn read_resource(&self, uri: &str) -> McpResult<ReadResourceResult> {
        let request = ReadResourceRequest {
            uri: uri.to_string(),
        };
        let params = to_params(methods::READ_RESOURCE, &request)?;
        self.request(methods::READ_RESOURCE, Some(params)).await
    }
}
