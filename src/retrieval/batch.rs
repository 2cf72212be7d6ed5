//! Batch embedding processor (C4).


use std::sync::Arc;

use futures_util::future::join_all;
use tracing::warn;

use crate::document::{Document, DocumentStore};
use crate::provider::LlmProvider;

/// Requests embeddings for documents that lack one, in fixed-size windows.
///
/// Per spec §4.4: documents that already carry a non-empty embedding pass
/// through untouched; the rest are embedded concurrently within their
/// window. A per-document failure is logged and the original (unembedded)
/// document is kept rather than dropped — the operation is lossless.
pub struct BatchEmbeddingProcessor<P: LlmProvider> {
    provider: Arc<P>,
}

impl<P: LlmProvider> BatchEmbeddingProcessor<P> {
    /// Creates a processor that requests embeddings from `provider`.
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Processes `docs` in windows of `batch_size`, returning exactly
    /// `docs.len()` documents (invariant 4): each is either the original
    /// (already embedded, or embedding failed) or a copy carrying a new
    /// embedding.
    pub async fn process_batch(&self, docs: Vec<Document>, batch_size: usize) -> Vec<Document> {
        let batch_size = batch_size.max(1);
        let mut results = Vec::with_capacity(docs.len());

        for window in docs.chunks(batch_size) {
            let embedded = self.process_window(window).await;
            results.extend(embedded);
        }

        results
    }

    async fn process_window(&self, window: &[Document]) -> Vec<Document> {
        let futures = window.iter().cloned().map(|doc| async move {
            if doc.embedding.is_some() {
                return doc;
            }

            match self.provider.get_embeddings(&doc.content).await {
                Ok(embedding) => doc.with_embedding(embedding),
                Err(e) => {
                    warn!(document_id = %doc.id, error = %e, "embedding request failed; keeping document without embedding");
                    doc
                }
            }
        });

        join_all(futures).await
    }

    /// Embeds every document in `collection_id` that lacks an embedding
    /// (or all of them, if `skip_existing` is `false`), writing back only
    /// those that received one. Documents are embedded concurrently in
    /// windows of `batch_size` (not all at once), bounding how many
    /// in-flight embedding requests this call can produce.
    pub async fn process_collection(
        &self,
        store: &DocumentStore,
        collection_id: &str,
        skip_existing: bool,
        batch_size: usize,
    ) -> usize {
        let docs = store.documents_in_collection(collection_id);
        let to_process: Vec<Document> = if skip_existing {
            docs.into_iter().filter(|d| d.embedding.is_none()).collect()
        } else {
            docs
        };

        if to_process.is_empty() {
            return 0;
        }

        let processed = self.process_batch(to_process, batch_size).await;
        let mut written = 0;
        for doc in processed {
            if doc.embedding.is_some() {
                store.add(doc);
                written += 1;
            }
        }
        written
    }
}
