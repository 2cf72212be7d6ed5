//! Shared types for the retrieval manager and its backends.

use thiserror::Error;

use crate::document::DocumentError;
use crate::provider::ProviderError;
use crate::value::Metadata;
use crate::vectordb::VectorStoreError;

/// Errors raised by retrieval operations (C4, C6).
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The configured document-store backend raised an error.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The configured vector-store backend raised an error.
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    /// The LLM provider raised an error during expansion, rerank, or generation.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A caller-supplied argument failed validation.
    #[error("validation error: {0}")]
    Validation(String),
}

/// A backend-agnostic retrieved item: the common shape produced by both the
/// document-store and vector-store backends for downstream ranking, caching,
/// and prompt assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    /// Unique id within the owning backend.
    pub id: String,
    /// Title, if the backend tracks one (vector-store metadata key `"title"`).
    pub title: String,
    /// Body text (vector-store metadata key `"content"`).
    pub content: String,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Similarity/relevance score. Semantics depend on the search method that
    /// produced it; callers must not compare scores across methods.
    pub score: f32,
    /// Epoch-millisecond last-update marker, if known.
    pub updated_at: i64,
}

impl RetrievedDocument {
    pub(crate) fn from_document(document: crate::document::Document, score: f32) -> Self {
        Self {
            id: document.id,
            title: document.title,
            content: document.content,
            metadata: document.metadata,
            score,
            updated_at: document.updated_at,
        }
    }

    pub(crate) fn from_vector_match(m: crate::vectordb::VectorMatch) -> Self {
        let title = m
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(&m.id)
            .to_string();
        let content = m.metadata.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let updated_at = m.metadata.get("updated_at").and_then(|v| v.as_int()).unwrap_or(0);
        Self {
            id: m.id,
            title,
            content,
            metadata: m.metadata,
            score: m.score,
            updated_at,
        }
    }
}
