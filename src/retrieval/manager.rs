//! Retrieval manager (C6): the query→embedding→search→rerank→generate
//! pipeline, built over either the document store (C2) or the vector store
//! contract (C5).

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future::join_all;
use tracing::warn;

use crate::document::{Document, DocumentStore};
use crate::provider::{CompletionRequest, LlmProvider};
use crate::value::{FilterMap, Metadata, MetadataValue};
use crate::vectordb::{VectorDocument, VectorStore};

use super::cache::RetrievalCache;
use super::rerank::{rerank_lightweight, rerank_with_llm};
use super::types::{RetrievalError, RetrievedDocument};

const APOLOGY: &str =
    "I'm sorry, I wasn't able to generate an answer from the available information right now.";

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// The store a [`RetrievalManager`] searches against. Document-store search
/// supports collection scoping and native keyword search; vector-store
/// search supports namespaces and metadata filters but has no keyword phase
/// of its own.
#[derive(Clone)]
pub enum RetrievalBackend {
    /// Embedding + keyword search over a [`DocumentStore`].
    Documents(Arc<DocumentStore>),
    /// Embedding search over a namespace-scoped [`VectorStore`].
    Vectors(Arc<dyn VectorStore>),
}

impl RetrievalBackend {
    async fn semantic_search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: Option<f32>,
        ns_or_collection: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        match self {
            RetrievalBackend::Documents(store) => {
                let scored = match ns_or_collection {
                    Some(collection) => store.find_similar_in_collection(collection, query_embedding, limit, min_score),
                    None => store.find_similar(query_embedding, limit, min_score),
                };
                Ok(scored
                    .into_iter()
                    .map(|s| RetrievedDocument::from_document(s.document, s.score))
                    .collect())
            }
            RetrievalBackend::Vectors(store) => {
                let matches = store
                    .find_similar_documents(query_embedding, limit, min_score, ns_or_collection, filters)
                    .await?;
                Ok(matches.into_iter().map(RetrievedDocument::from_vector_match).collect())
            }
        }
    }

    /// Native keyword search, if the backend supports one. `None` for
    /// vector-store backends (spec §4.6: keyword phase is skipped).
    fn keyword_search(&self, query: &str, limit: usize) -> Option<Vec<RetrievedDocument>> {
        match self {
            RetrievalBackend::Documents(store) => Some(
                store
                    .search_by_content(query, limit)
                    .into_iter()
                    .map(|s| RetrievedDocument::from_document(s.document, s.score))
                    .collect(),
            ),
            RetrievalBackend::Vectors(_) => None,
        }
    }

    async fn upsert(
        &self,
        document: Document,
        embedding: Vec<f32>,
        ns: Option<&str>,
    ) -> Result<(), RetrievalError> {
        match self {
            RetrievalBackend::Documents(store) => {
                store.add(document.with_embedding(embedding));
                Ok(())
            }
            RetrievalBackend::Vectors(store) => {
                let mut metadata: Metadata = document.metadata.clone();
                metadata.insert("title".to_string(), MetadataValue::String(document.title.clone()));
                metadata.insert("content".to_string(), MetadataValue::String(document.content.clone()));
                metadata.insert("updated_at".to_string(), MetadataValue::Int(document.updated_at));
                store
                    .upsert_document(
                        VectorDocument {
                            id: document.id,
                            vector: embedding,
                            metadata,
                        },
                        ns,
                    )
                    .await?;
                Ok(())
            }
        }
    }

    async fn remove(&self, id: &str, ns: Option<&str>) -> Result<(), RetrievalError> {
        match self {
            RetrievalBackend::Documents(store) => {
                store.delete(id);
                Ok(())
            }
            RetrievalBackend::Vectors(store) => {
                store.delete(id, ns).await?;
                Ok(())
            }
        }
    }
}

/// Query→embedding→search pipeline with caching, hybrid search, context-aware
/// expansion, reranking, time-weighting, multi-collection fan-out, and RAG
/// prompt assembly (spec §4.6).
pub struct RetrievalManager<P: LlmProvider> {
    backend: RetrievalBackend,
    provider: Arc<P>,
    cache: RetrievalCache,
}

impl<P: LlmProvider> RetrievalManager<P> {
    /// Builds a manager over `backend`, using `provider` for embeddings,
    /// expansion, reranking, and generation.
    pub fn new(backend: RetrievalBackend, provider: Arc<P>) -> Self {
        Self {
            backend,
            provider,
            cache: RetrievalCache::new(),
        }
    }

    /// Embeds and stores a single document.
    pub async fn add_document(&self, document: Document, ns: Option<&str>) -> Result<(), RetrievalError> {
        let embedding = self.provider.get_embeddings(&document.content).await?;
        self.backend.upsert(document, embedding, ns).await
    }

    /// Embeds and stores every document, continuing past individual
    /// embedding failures (mirrors the batch embedding processor's
    /// loss-tolerant behavior, C4).
    pub async fn add_documents(&self, documents: Vec<Document>, ns: Option<&str>) -> Vec<Result<(), RetrievalError>> {
        let futures = documents.into_iter().map(|document| async move { self.add_document(document, ns).await });
        join_all(futures).await
    }

    /// Plain semantic retrieval, with optional caching.
    pub async fn retrieve_relevant(
        &self,
        query: &str,
        top_k: usize,
        min_score: Option<f32>,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
        use_cache: bool,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if use_cache && let Some(hit) = self.cache.get(query, Some(top_k)) {
            return Ok(hit);
        }

        let embedding = self.provider.get_embeddings(query).await?;
        let results = self
            .backend
            .semantic_search(&embedding, top_k, min_score, ns, filters)
            .await?;

        if use_cache {
            self.cache.put(query, Some(top_k), &results);
        }
        Ok(results)
    }

    /// Runs semantic and keyword search, merging scores for documents found
    /// by both (spec §4.6).
    pub async fn hybrid_search(
        &self,
        query: &str,
        n_semantic: usize,
        n_keyword: usize,
        n_final: usize,
        boost: f32,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let embedding = self.provider.get_embeddings(query).await?;
        let semantic = self.backend.semantic_search(&embedding, n_semantic, None, ns, filters).await?;
        let keyword = self.backend.keyword_search(query, n_keyword);

        let mut merged: Vec<RetrievedDocument> = Vec::with_capacity(semantic.len());
        let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for doc in semantic {
            index.insert(doc.id.clone(), merged.len());
            merged.push(doc);
        }

        if let Some(keyword) = keyword {
            for doc in keyword {
                if let Some(&pos) = index.get(&doc.id) {
                    merged[pos].score += doc.score * boost;
                } else {
                    let mut doc = doc;
                    doc.score *= 1.0 - boost;
                    merged.push(doc);
                }
            }
        }

        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(n_final);
        Ok(merged)
    }

    /// Expands `query` using up to the 5 most recent `previous_queries`
    /// before delegating to [`Self::hybrid_search`]. Falls through to
    /// [`Self::retrieve_relevant`] if there's no history, and falls back to
    /// the original query on a provider error.
    pub async fn context_aware_search(
        &self,
        query: &str,
        previous_queries: &[String],
        top_k: usize,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if previous_queries.is_empty() {
            return self.retrieve_relevant(query, top_k, None, ns, filters, true).await;
        }

        let recent: Vec<&String> = previous_queries.iter().rev().take(5).collect();
        let history = recent
            .iter()
            .rev()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Given the conversation history below and a new query, rewrite the query as a \
             single, fully self-contained search query that incorporates relevant context from \
             the history. Respond with only the rewritten query.\n\nHistory:\n{history}\n\nNew \
             query: {query}"
        );

        let expanded = match self
            .provider
            .complete(CompletionRequest::new(prompt).with_temperature(0.3))
            .await
        {
            Ok(response) => response.text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "query expansion failed; falling back to the original query");
                return self.retrieve_relevant(query, top_k, None, ns, filters, true).await;
            }
        };

        self.hybrid_search(&expanded, top_k * 2, top_k * 2, top_k, 0.5, ns, filters).await
    }

    /// Reranks `candidates`, choosing between the lightweight BM25-like
    /// algorithm and an LLM-based ordering.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievedDocument>,
        top_k: usize,
        lightweight: bool,
    ) -> Vec<RetrievedDocument> {
        if lightweight {
            rerank_lightweight(query, candidates, top_k, now_ms())
        } else {
            rerank_with_llm(self.provider.as_ref(), query, candidates, top_k).await
        }
    }

    /// Retrieves `2 * top_k` candidates and reranks them by a blend of
    /// recency and original rank (spec §4.6).
    pub async fn time_weighted_retrieval(
        &self,
        query: &str,
        top_k: usize,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
        recency_weight: f32,
        freshness_window_ms: i64,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let candidates = self
            .retrieve_relevant(query, top_k * 2, None, ns, filters, false)
            .await?;
        let n = candidates.len().max(1) as f32;
        let now = now_ms();

        let mut scored: Vec<(f32, RetrievedDocument)> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, doc)| {
                let age = (now - doc.updated_at).max(0) as f32;
                let recency_score = (1.0 - age / freshness_window_ms.max(1) as f32).max(0.0);
                let index_score = 1.0 - (index as f32 / n);
                let combined = recency_score * recency_weight + index_score * (1.0 - recency_weight);
                (combined, doc)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().map(|(_, doc)| doc).take(top_k).collect())
    }

    /// Fans a search out across multiple collections/namespaces
    /// concurrently, concatenating the results and optionally reranking.
    pub async fn multi_collection_search(
        &self,
        query: &str,
        collections: &[String],
        top_k: usize,
        rerank_lightweight_pass: bool,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let embedding = self.provider.get_embeddings(query).await?;

        let futures = collections
            .iter()
            .map(|collection| self.backend.semantic_search(&embedding, top_k, None, Some(collection.as_str()), None));
        let results = join_all(futures).await;

        let mut combined = Vec::new();
        for result in results {
            combined.extend(result?);
        }

        if rerank_lightweight_pass {
            Ok(rerank_lightweight(query, combined, top_k, now_ms()))
        } else {
            combined.truncate(top_k);
            Ok(combined)
        }
    }

    /// Retrieves then reranks in one call.
    pub async fn retrieve_and_rerank(
        &self,
        query: &str,
        top_k: usize,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
        lightweight: bool,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let candidates = self.retrieve_relevant(query, top_k * 2, None, ns, filters, false).await?;
        Ok(self.rerank(query, candidates, top_k, lightweight).await)
    }

    fn build_context(documents: &[RetrievedDocument]) -> String {
        documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let updated = chrono::DateTime::from_timestamp_millis(doc.updated_at)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default();
                format!("[Document {}]\nTitle: {}\nContent: {}\nLast Updated: {updated}", i + 1, doc.title, doc.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn generate(&self, query: &str, documents: &[RetrievedDocument]) -> String {
        let prompt = if documents.is_empty() {
            format!("Answer the following question. No supporting context was found.\n\nQuestion: {query}")
        } else {
            format!(
                "Answer the question using only the information in the context below. Cite \
                 sources as [Document X]. If the context does not contain enough information to \
                 answer, say so explicitly.\n\nContext:\n{}\n\nQuestion: {query}",
                Self::build_context(documents)
            )
        };

        match self.provider.complete(CompletionRequest::new(prompt)).await {
            Ok(response) => response.text,
            Err(e) => {
                warn!(error = %e, "generation failed");
                APOLOGY.to_string()
            }
        }
    }

    /// Retrieves relevant documents and generates a cited answer, falling
    /// back to a fixed apology string on a provider error rather than
    /// bubbling it.
    pub async fn retrieve_and_generate(
        &self,
        query: &str,
        top_k: usize,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<String, RetrievalError> {
        let documents = self.retrieve_relevant(query, top_k, None, ns, filters, true).await?;
        Ok(self.generate(query, &documents).await)
    }

    /// Like [`Self::retrieve_and_generate`], but reranks the candidates
    /// before assembling the answer (for callers retrieving over chunked
    /// documents, where the top semantic hits may not be the most relevant
    /// chunks).
    pub async fn multi_chunk_answer(
        &self,
        query: &str,
        top_k: usize,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<String, RetrievalError> {
        let documents = self.retrieve_and_rerank(query, top_k, ns, filters, true).await?;
        Ok(self.generate(query, &documents).await)
    }

    /// Deletes a single document from the backend.
    pub async fn delete_document(&self, id: &str, ns: Option<&str>) -> Result<(), RetrievalError> {
        self.backend.remove(id, ns).await
    }

    /// Deletes multiple documents from the backend.
    pub async fn delete_documents(&self, ids: &[String], ns: Option<&str>) -> Result<(), RetrievalError> {
        for id in ids {
            self.backend.remove(id, ns).await?;
        }
        Ok(())
    }

    /// Clears the retrieval result cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Releases backend resources.
    pub async fn close(&self) -> Result<(), RetrievalError> {
        if let RetrievalBackend::Vectors(store) = &self.backend {
            store.close().await?;
        }
        Ok(())
    }
}
