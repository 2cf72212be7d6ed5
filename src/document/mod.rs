//! Document model & in-memory store (C2).
//!
//! `Document`/`DocumentCollection` are copy-on-write value types; mutating
//! operations on [`DocumentStore`] hand back or store a new instance rather
//! than mutate in place.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::value::Metadata;

/// Errors returned by [`DocumentStore`] operations.
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    /// No document/collection exists with the given id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A document's embedding length did not match the store's dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A single retrievable unit of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique id within the owning store.
    pub id: String,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Optional embedding vector.
    pub embedding: Option<Vec<f32>>,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Optional owning collection id. Not enforced by referential integrity.
    pub collection_id: Option<String>,
    /// Monotonic update marker (epoch milliseconds at last mutation).
    pub updated_at: i64,
}

impl Document {
    /// Creates a new document, auto-generating an id if `id` is `None`.
    pub fn new(id: Option<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or_else(generate_document_id),
            title: title.into(),
            content: content.into(),
            embedding: None,
            metadata: Metadata::new(),
            collection_id: None,
            updated_at: now_ms(),
        }
    }

    /// Returns a copy with `embedding` set and `updated_at` refreshed.
    pub fn with_embedding(&self, embedding: Vec<f32>) -> Self {
        let mut next = self.clone();
        next.embedding = Some(embedding);
        next.updated_at = now_ms();
        next
    }
}

/// A named grouping that documents may reference by id.
///
/// Collections do not own documents: deleting one does not cascade to the
/// documents that reference it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCollection {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: Metadata,
}

impl DocumentCollection {
    /// Creates a new collection, auto-generating an id if `id` is `None`.
    pub fn new(id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or_else(generate_document_id),
            name: name.into(),
            description: None,
            metadata: Metadata::new(),
        }
    }
}

/// A document paired with a similarity/relevance score.
///
/// Score semantics depend on the source (cosine, certainty, BM25-like
/// weight) — callers must not compare scores produced by different search
/// methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn generate_document_id() -> String {
    format!("doc_{}_{}", now_ms(), uuid::Uuid::new_v4().simple())
}

/// In-memory document + collection store with keyword and embedding search.
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Document>>,
    collections: RwLock<HashMap<String, DocumentCollection>>,
    /// Insertion sequence per document id, for stable tie-breaking in
    /// [`DocumentStore::find_similar_filtered`]/[`DocumentStore::search_by_content`].
    /// `HashMap` iteration order is randomized per-instance, so ties can't
    /// rely on it directly.
    seq: RwLock<HashMap<String, u64>>,
    next_seq: AtomicU64,
}

impl DocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document, returning the stored copy.
    pub fn add(&self, document: Document) -> Document {
        self.documents
            .write()
            .expect("lock poisoned")
            .insert(document.id.clone(), document.clone());
        self.seq
            .write()
            .expect("lock poisoned")
            .entry(document.id.clone())
            .or_insert_with(|| self.next_seq.fetch_add(1, Ordering::Relaxed));
        document
    }

    /// Looks up a document by id.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.read().expect("lock poisoned").get(id).cloned()
    }

    /// Applies `update` to the stored document and persists the result.
    /// Fails with [`DocumentError::NotFound`] if `id` is absent.
    pub fn update(
        &self,
        id: &str,
        update: impl FnOnce(Document) -> Document,
    ) -> Result<Document, DocumentError> {
        let mut guard = self.documents.write().expect("lock poisoned");
        let existing = guard
            .get(id)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;

        let mut updated = update(existing);
        updated.id = id.to_string();
        updated.updated_at = now_ms();
        guard.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Removes a document by id. Not an error if absent.
    pub fn delete(&self, id: &str) -> Option<Document> {
        self.seq.write().expect("lock poisoned").remove(id);
        self.documents.write().expect("lock poisoned").remove(id)
    }

    /// Creates (or replaces) a collection.
    pub fn create_collection(&self, collection: DocumentCollection) -> DocumentCollection {
        self.collections
            .write()
            .expect("lock poisoned")
            .insert(collection.id.clone(), collection.clone());
        collection
    }

    /// Looks up a collection by id.
    pub fn get_collection(&self, id: &str) -> Option<DocumentCollection> {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
    }

    /// Removes a collection by id. Does not delete member documents.
    pub fn delete_collection(&self, id: &str) -> Option<DocumentCollection> {
        self.collections.write().expect("lock poisoned").remove(id)
    }

    /// Returns every document referencing `collection_id`.
    pub fn documents_in_collection(&self, collection_id: &str) -> Vec<Document> {
        self.documents
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|d| d.collection_id.as_deref() == Some(collection_id))
            .cloned()
            .collect()
    }

    /// Deletes every document referencing `collection_id`, returning the
    /// number removed.
    pub fn delete_documents_in_collection(&self, collection_id: &str) -> usize {
        let mut guard = self.documents.write().expect("lock poisoned");
        let ids: Vec<String> = guard
            .values()
            .filter(|d| d.collection_id.as_deref() == Some(collection_id))
            .map(|d| d.id.clone())
            .collect();
        let mut seq_guard = self.seq.write().expect("lock poisoned");
        for id in &ids {
            guard.remove(id);
            seq_guard.remove(id);
        }
        ids.len()
    }

    /// Finds documents with a non-empty embedding most similar to
    /// `query_embedding` by cosine similarity, optionally restricted to
    /// documents scoring at least `min_score`.
    ///
    /// Ties preserve insertion (iteration) order; `limit` bounds the result.
    pub fn find_similar(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: Option<f32>,
    ) -> Vec<ScoredDocument> {
        self.find_similar_filtered(query_embedding, limit, min_score, None)
    }

    /// Same as [`DocumentStore::find_similar`] but restricted to documents
    /// in `collection_id`.
    pub fn find_similar_in_collection(
        &self,
        collection_id: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: Option<f32>,
    ) -> Vec<ScoredDocument> {
        self.find_similar_filtered(query_embedding, limit, min_score, Some(collection_id))
    }

    fn find_similar_filtered(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: Option<f32>,
        collection_id: Option<&str>,
    ) -> Vec<ScoredDocument> {
        let guard = self.documents.read().expect("lock poisoned");
        let seq_guard = self.seq.read().expect("lock poisoned");

        let mut scored: Vec<(ScoredDocument, u64)> = guard
            .values()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                if embedding.len() != query_embedding.len() {
                    return None;
                }
                if let Some(cid) = collection_id
                    && doc.collection_id.as_deref() != Some(cid)
                {
                    return None;
                }
                let score = crate::embedding::vector::cosine(query_embedding, embedding).ok()?;
                if let Some(min) = min_score
                    && score < min
                {
                    return None;
                }
                let seq = seq_guard.get(&doc.id).copied().unwrap_or(u64::MAX);
                Some((
                    ScoredDocument {
                        document: doc.clone(),
                        score,
                    },
                    seq,
                ))
            })
            .collect();

        // Ties preserve insertion order; `HashMap` iteration order is not it,
        // so sort on the explicit sequence recorded at insert time.
        scored.sort_by(|(a, a_seq), (b, b_seq)| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a_seq.cmp(b_seq))
        });
        scored.truncate(limit);
        scored.into_iter().map(|(s, _)| s).collect()
    }

    /// Keyword search over title/content.
    ///
    /// Scoring: +100 exact title match, +50 title contains, +25 content
    /// contains, +5 per additional content occurrence beyond the first.
    /// Documents scoring 0 are dropped.
    pub fn search_by_content(&self, query: &str, limit: usize) -> Vec<ScoredDocument> {
        let query_lower = query.to_lowercase();
        if query_lower.is_empty() {
            return Vec::new();
        }

        let guard = self.documents.read().expect("lock poisoned");
        let seq_guard = self.seq.read().expect("lock poisoned");
        let mut scored: Vec<(ScoredDocument, u64)> = guard
            .values()
            .filter_map(|doc| {
                let score = keyword_score(&query_lower, doc);
                if score <= 0.0 {
                    None
                } else {
                    let seq = seq_guard.get(&doc.id).copied().unwrap_or(u64::MAX);
                    Some((
                        ScoredDocument {
                            document: doc.clone(),
                            score,
                        },
                        seq,
                    ))
                }
            })
            .collect();

        scored.sort_by(|(a, a_seq), (b, b_seq)| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a_seq.cmp(b_seq))
        });
        scored.truncate(limit);
        scored.into_iter().map(|(s, _)| s).collect()
    }
}

fn keyword_score(query_lower: &str, doc: &Document) -> f32 {
    let title_lower = doc.title.to_lowercase();
    let content_lower = doc.content.to_lowercase();

    let mut score = 0.0;

    if title_lower == *query_lower {
        score += 100.0;
    } else if title_lower.contains(query_lower) {
        score += 50.0;
    }

    let occurrences = content_lower.matches(query_lower).count();
    if occurrences > 0 {
        score += 25.0;
        score += 5.0 * (occurrences - 1) as f32;
    }

    score
}
