//! Deterministic test doubles for [`super::LlmProvider`] and [`super::McpClient`].

use std::collections::HashMap;
use std::sync::RwLock;

use super::{CompletionRequest, CompletionResponse, McpEntry, McpError, ProviderError, StreamChunk};

/// A provider that echoes the prompt back, optionally canned per-prompt.
#[derive(Default)]
pub struct MockLlmProvider {
    responses: RwLock<HashMap<String, String>>,
    embedding_dim: usize,
}

impl MockLlmProvider {
    /// Creates a provider with a fixed embedding dimension (echo completion).
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            embedding_dim,
        }
    }

    /// Registers a canned response for an exact prompt match.
    pub fn with_response(self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses
            .write()
            .expect("lock poisoned")
            .insert(prompt.into(), response.into());
        self
    }
}

impl super::LlmProvider for MockLlmProvider {
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let text = self
            .responses
            .read()
            .expect("lock poisoned")
            .get(&request.prompt)
            .cloned()
            .unwrap_or_else(|| format!("echo: {}", request.prompt));

        Ok(CompletionResponse {
            text,
            metadata: HashMap::new(),
        })
    }

    async fn stream_complete(&self, request: CompletionRequest) -> Result<Vec<StreamChunk>, ProviderError> {
        let response = self.complete(request).await?;
        Ok(vec![StreamChunk {
            text_chunk: response.text,
            is_done: true,
            metadata: response.metadata,
        }])
    }

    async fn get_embeddings(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut state = blake3::hash(text.as_bytes()).as_bytes()[0] as u64 + 1;
        let values: Vec<f32> = (0..self.embedding_dim)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((state >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        Ok(crate::embedding::vector::normalize(&values))
    }

    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// An MCP client backed by fixed in-memory tool/prompt/resource tables.
#[derive(Default)]
pub struct MockMcpClient {
    tools: Vec<McpEntry>,
    prompts: Vec<McpEntry>,
    resources: Vec<McpEntry>,
    supports_auth: bool,
    fail_listing: bool,
}

impl MockMcpClient {
    /// Creates a client with no registered tools/prompts/resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool name.
    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(McpEntry { name: name.into() });
        self
    }

    /// Registers a prompt name.
    pub fn with_prompt(mut self, name: impl Into<String>) -> Self {
        self.prompts.push(McpEntry { name: name.into() });
        self
    }

    /// Registers a resource URI.
    pub fn with_resource(mut self, name: impl Into<String>) -> Self {
        self.resources.push(McpEntry { name: name.into() });
        self
    }

    /// Advertises authentication-enablement support.
    pub fn with_authentication_supported(mut self) -> Self {
        self.supports_auth = true;
        self
    }

    /// Makes every listing call fail, for health/capability failure-path tests.
    pub fn failing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

impl super::McpClient for MockMcpClient {
    async fn list_tools(&self) -> Result<Vec<McpEntry>, McpError> {
        if self.fail_listing {
            return Err(McpError::CallFailed("listTools failed".to_string()));
        }
        Ok(self.tools.clone())
    }

    async fn list_prompts(&self) -> Result<Vec<McpEntry>, McpError> {
        if self.fail_listing {
            return Err(McpError::CallFailed("listPrompts failed".to_string()));
        }
        Ok(self.prompts.clone())
    }

    async fn list_resources(&self) -> Result<Vec<McpEntry>, McpError> {
        if self.fail_listing {
            return Err(McpError::CallFailed("listResources failed".to_string()));
        }
        Ok(self.resources.clone())
    }

    async fn call_tool(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value, McpError> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(McpError::NotFound(name.to_string()));
        }
        Ok(serde_json::json!({ "tool": name, "args": args }))
    }

    async fn call_prompt(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value, McpError> {
        if !self.prompts.iter().any(|p| p.name == name) {
            return Err(McpError::NotFound(name.to_string()));
        }
        Ok(serde_json::json!({ "prompt": name, "args": args }))
    }

    async fn read_resource(&self, uri: &str) -> Result<serde_json::Value, McpError> {
        if !self.resources.iter().any(|r| r.name == uri) {
            return Err(McpError::NotFound(uri.to_string()));
        }
        Ok(serde_json::json!({ "resource": uri }))
    }

    fn supports_authentication(&self) -> bool {
        self.supports_auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{LlmProvider, McpClient};

    #[tokio::test]
    async fn mock_provider_echoes_by_default() {
        let provider = MockLlmProvider::new(8);
        let response = provider.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(response.text, "echo: hi");
    }

    #[tokio::test]
    async fn mock_provider_returns_canned_response() {
        let provider = MockLlmProvider::new(8).with_response("hi", "hello there");
        let response = provider.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(response.text, "hello there");
    }

    #[tokio::test]
    async fn mock_provider_embeddings_are_deterministic() {
        let provider = MockLlmProvider::new(16);
        let a = provider.get_embeddings("text").await.unwrap();
        let b = provider.get_embeddings("text").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn mock_mcp_client_lists_registered_tools() {
        let client = MockMcpClient::new().with_tool("search");
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search");
    }

    #[tokio::test]
    async fn mock_mcp_client_call_tool_unknown_errors() {
        let client = MockMcpClient::new();
        let result = client.call_tool("missing", serde_json::json!({})).await;
        assert!(matches!(result, Err(McpError::NotFound(_))));
    }

    #[tokio::test]
    async fn mock_mcp_client_failing_propagates_errors() {
        let client = MockMcpClient::new().failing();
        assert!(client.list_tools().await.is_err());
    }
}
