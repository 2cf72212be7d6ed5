//! Namespace-scoped vector store contract (C5, spec §4.5).

use thiserror::Error;

use crate::value::{FilterMap, Metadata};

/// The namespace used when callers pass `None`.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Errors returned by [`VectorStore`] implementations.
#[derive(Debug, Error, PartialEq)]
pub enum VectorStoreError {
    /// An id, embedding, or filter failed a precondition.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The store's invariants would be violated (e.g. capacity exceeded).
    #[error("state error: {message}")]
    State { message: String },

    /// No id/namespace found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl VectorStoreError {
    pub(crate) fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::Validation {
            message: format!("dimension mismatch: expected {expected}, got {actual}"),
        }
    }
}

/// A document plus its embedding, as stored by [`VectorStore::upsert_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// A scored match returned by [`VectorStore::find_similar`]/`find_similar_documents`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// Uniform contract over namespace-scoped embedding/document operations.
///
/// `ns ?? "default"` (spec §4.5): every operation treats `None` as
/// [`DEFAULT_NAMESPACE`]. A missing namespace is created implicitly on first
/// write. Batch operations are idempotent by id.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Stores a single embedding under `id`, creating `ns` if absent.
    async fn store_embedding(
        &self,
        id: &str,
        embedding: Vec<f32>,
        metadata: Option<Metadata>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError>;

    /// Stores many embeddings in one call; idempotent by id.
    async fn store_embedding_batch(
        &self,
        items: Vec<(String, Vec<f32>, Option<Metadata>)>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError>;

    /// Finds the `limit` closest ids to `query_embedding` by cosine similarity.
    async fn find_similar(
        &self,
        query_embedding: &[f32],
        limit: usize,
        threshold: Option<f32>,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError>;

    /// Removes a single id from `ns`.
    async fn delete(&self, id: &str, ns: Option<&str>) -> Result<(), VectorStoreError>;

    /// Removes many ids from `ns`; idempotent (missing ids are ignored).
    async fn delete_batch(&self, ids: &[String], ns: Option<&str>) -> Result<(), VectorStoreError>;

    /// `true` iff `id` exists in `ns`.
    async fn exists(&self, id: &str, ns: Option<&str>) -> Result<bool, VectorStoreError>;

    /// Returns the raw embedding stored for `id`, if any.
    async fn get_embedding(&self, id: &str, ns: Option<&str>) -> Result<Option<Vec<f32>>, VectorStoreError>;

    /// Explicitly creates `ns`. A no-op if it already exists.
    async fn create_namespace(&self, ns: &str) -> Result<(), VectorStoreError>;

    /// Deletes `ns` and everything in it.
    async fn delete_namespace(&self, ns: &str) -> Result<(), VectorStoreError>;

    /// Lists every known namespace.
    async fn list_namespaces(&self) -> Result<Vec<String>, VectorStoreError>;

    /// Stores `document`, indexing it under its own embedding. Fails with
    /// [`VectorStoreError::Validation`] if the document has no embedding.
    async fn upsert_document(&self, document: VectorDocument, ns: Option<&str>) -> Result<(), VectorStoreError>;

    /// Stores many documents in one call; idempotent by id.
    async fn upsert_document_batch(
        &self,
        documents: Vec<VectorDocument>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError>;

    /// Returns the document stored under `id`, if any.
    async fn get_document(&self, id: &str, ns: Option<&str>) -> Result<Option<VectorDocument>, VectorStoreError>;

    /// Like [`VectorStore::find_similar`] but returns full matches with metadata.
    async fn find_similar_documents(
        &self,
        query_embedding: &[f32],
        limit: usize,
        threshold: Option<f32>,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError>;

    /// Releases any resources held by the backend (connections, file handles).
    async fn close(&self) -> Result<(), VectorStoreError>;
}

pub(crate) fn resolve_namespace(ns: Option<&str>) -> &str {
    ns.unwrap_or(DEFAULT_NAMESPACE)
}
