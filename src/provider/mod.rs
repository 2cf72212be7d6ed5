//! LLM provider and MCP client contracts (§6 External Interfaces).
//!
//! Both concrete wire formats are explicit Non-goals; these traits describe
//! the shape the rest of the crate consumes. [`mock`] offers deterministic
//! test doubles; [`genai`] wires a real backend through the `genai` crate.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod genai;

use std::collections::HashMap;
use std::future::Future;

pub use error::{McpError, ProviderError};

use crate::value::MetadataValue;

/// A single chat/completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The prompt or final user message to send.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate, if bounded.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Builds a request with the default temperature (`0.7`).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Returns a copy with `temperature` set.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A completed (non-streaming) response.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,
    /// Provider-supplied metadata (token counts, finish reason, etc).
    pub metadata: HashMap<String, MetadataValue>,
}

/// One chunk of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    /// Incremental text delta.
    pub text_chunk: String,
    /// `true` on the final chunk of the stream.
    pub is_done: bool,
    /// Provider-supplied metadata, typically only present on the final chunk.
    pub metadata: HashMap<String, MetadataValue>,
}

/// An LLM provider (§6: consumed, not implemented by this crate beyond
/// [`genai::GenAiProvider`] and [`mock::MockLlmProvider`]).
pub trait LlmProvider: Send + Sync {
    /// Prepares the provider for use (auth, connection warmup, etc).
    fn initialize(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Issues a single request/response completion.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send;

    /// Issues a streaming completion, returning every chunk as a `Vec`
    /// (the underlying stream is finite and not restartable per §6).
    fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Vec<StreamChunk>, ProviderError>> + Send;

    /// Returns an embedding vector for `text`.
    fn get_embeddings(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, ProviderError>> + Send;

    /// Releases any held resources.
    fn close(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// A discoverable MCP tool/prompt/resource name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct McpEntry {
    /// Tool/prompt/resource name or URI.
    pub name: String,
}

/// An MCP client (§6: consumed). `execute_batch` and `enable_authentication`
/// are optional capabilities — their absence is a valid capability signal,
/// surfaced here as `Unsupported` rather than a hard error.
pub trait McpClient: Send + Sync {
    /// Lists available tools.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<McpEntry>, McpError>> + Send;

    /// Lists available prompts.
    fn list_prompts(&self) -> impl Future<Output = Result<Vec<McpEntry>, McpError>> + Send;

    /// Lists available resources.
    fn list_resources(&self) -> impl Future<Output = Result<Vec<McpEntry>, McpError>> + Send;

    /// Invokes a tool by name with JSON arguments.
    fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, McpError>> + Send;

    /// Invokes a prompt by name with JSON arguments.
    fn call_prompt(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, McpError>> + Send;

    /// Reads a resource by URI.
    fn read_resource(
        &self,
        uri: &str,
    ) -> impl Future<Output = Result<serde_json::Value, McpError>> + Send;

    /// Executes a JSON-RPC 2.0 batch, if supported (consumed by C9).
    fn execute_batch(
        &self,
        requests: Vec<serde_json::Value>,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, McpError>> + Send {
        async move {
            let _ = requests;
            Err(McpError::Unsupported("execute_batch".to_string()))
        }
    }

    /// Returns `true` once authentication has been enabled (consumed by C12's
    /// OAuth 2.1 compliance check).
    fn supports_authentication(&self) -> bool {
        false
    }
}
