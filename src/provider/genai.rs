//! [`LlmProvider`](super::LlmProvider) backed by the `genai` multi-vendor client.

use std::sync::Arc;

use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use tracing::error;

use crate::embedding::SinterEmbedder;

use super::{CompletionRequest, CompletionResponse, McpEntry, ProviderError, StreamChunk};

/// Routes completions through `genai`, which dispatches to whichever vendor
/// backend (OpenAI, Anthropic, Gemini, …) the configured model belongs to.
/// `genai` itself exposes no embeddings endpoint, so embeddings are delegated
/// to an optional local [`SinterEmbedder`]; without one, [`Self::get_embeddings`]
/// fails with [`ProviderError::Unsupported`].
#[derive(Clone)]
pub struct GenAiProvider {
    client: Client,
    model: String,
    embedding_dim: usize,
    embedder: Option<Arc<SinterEmbedder>>,
}

impl GenAiProvider {
    /// Creates a provider that completes against `model` using the default
    /// `genai` client (credentials resolved from the environment).
    pub fn new(model: impl Into<String>, embedding_dim: usize) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            embedding_dim,
            embedder: None,
        }
    }

    /// Returns a copy that delegates [`LlmProvider::get_embeddings`] to `embedder`.
    pub fn with_local_embedder(mut self, embedder: Arc<SinterEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn chat_request(prompt: &str) -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user(prompt)])
    }

    fn chat_options(request: &CompletionRequest) -> ChatOptions {
        let mut options = ChatOptions::default().with_temperature(request.temperature as f64);
        if let Some(max_tokens) = request.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        options
    }
}

impl super::LlmProvider for GenAiProvider {
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let options = Self::chat_options(&request);
        let response = self
            .client
            .exec_chat(&self.model, Self::chat_request(&request.prompt), Some(&options))
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "genai completion failed");
                ProviderError::CallFailed(e.to_string())
            })?;

        Ok(CompletionResponse {
            text: response.first_text().unwrap_or_default().to_string(),
            metadata: Default::default(),
        })
    }

    async fn stream_complete(&self, request: CompletionRequest) -> Result<Vec<StreamChunk>, ProviderError> {
        use futures_util::StreamExt;
        use genai::chat::ChatStreamEvent;

        let options = Self::chat_options(&request);
        let stream_response = self
            .client
            .exec_chat_stream(&self.model, Self::chat_request(&request.prompt), Some(&options))
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "genai stream init failed");
                ProviderError::CallFailed(e.to_string())
            })?;

        let mut chunks = Vec::new();
        let mut stream = stream_response.stream;
        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => {
                    chunks.push(StreamChunk {
                        text_chunk: chunk.content,
                        is_done: false,
                        metadata: Default::default(),
                    });
                }
                Ok(ChatStreamEvent::End(_)) => {
                    chunks.push(StreamChunk {
                        text_chunk: String::new(),
                        is_done: true,
                        metadata: Default::default(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    error!(model = %self.model, error = %e, "genai stream error");
                    return Err(ProviderError::CallFailed(e.to_string()));
                }
            }
        }
        Ok(chunks)
    }

    async fn get_embeddings(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        match &self.embedder {
            Some(embedder) => embedder
                .embed(text)
                .map_err(|e| ProviderError::CallFailed(e.to_string())),
            None => Err(ProviderError::Unsupported(format!(
                "genai provider for model '{}' does not expose an embeddings endpoint; call \
                 with_local_embedder() to configure one (dim {})",
                self.model, self.embedding_dim
            ))),
        }
    }

    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Always returns empty listings: `genai` models are completion endpoints,
/// not MCP tool servers. Present so a [`GenAiProvider`] can satisfy call
/// sites expecting a uniform provider+client pairing in tests/examples.
#[derive(Debug, Clone, Default)]
pub struct NullMcpClient;

impl super::McpClient for NullMcpClient {
    async fn list_tools(&self) -> Result<Vec<McpEntry>, super::McpError> {
        Ok(Vec::new())
    }

    async fn list_prompts(&self) -> Result<Vec<McpEntry>, super::McpError> {
        Ok(Vec::new())
    }

    async fn list_resources(&self) -> Result<Vec<McpEntry>, super::McpError> {
        Ok(Vec::new())
    }

    async fn call_tool(&self, name: &str, _args: serde_json::Value) -> Result<serde_json::Value, super::McpError> {
        Err(super::McpError::NotFound(name.to_string()))
    }

    async fn call_prompt(&self, name: &str, _args: serde_json::Value) -> Result<serde_json::Value, super::McpError> {
        Err(super::McpError::NotFound(name.to_string()))
    }

    async fn read_resource(&self, uri: &str) -> Result<serde_json::Value, super::McpError> {
        Err(super::McpError::NotFound(uri.to_string()))
    }
}
