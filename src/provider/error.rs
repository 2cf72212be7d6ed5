//! Errors returned by [`super::LlmProvider`] and [`super::McpClient`] implementations.

use thiserror::Error;

/// Errors surfaced by an LLM provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider has not been initialized, or `initialize` failed.
    #[error("provider not initialized: {0}")]
    NotInitialized(String),

    /// The upstream call failed.
    #[error("provider call failed: {0}")]
    CallFailed(String),

    /// The provider does not support the requested capability (e.g. streaming).
    #[error("capability not supported: {0}")]
    Unsupported(String),
}

/// Errors surfaced by an MCP client.
#[derive(Debug, Error)]
pub enum McpError {
    /// The requested tool/prompt/resource is unknown to the client.
    #[error("not found: {0}")]
    NotFound(String),

    /// The call failed in transit or was rejected by the server.
    #[error("call failed: {0}")]
    CallFailed(String),

    /// The client does not support the requested capability.
    #[error("capability not supported: {0}")]
    Unsupported(String),
}
