//! High-performance in-memory [`VectorStore`] backend (spec §4.5, reference implementation).


use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::embedding::vector::norm;
use crate::value::{FilterMap, Metadata, matches_all};

use super::store::{VectorDocument, VectorMatch, VectorStore, VectorStoreError, resolve_namespace};

struct Entry {
    vector: Vec<f32>,
    norm: f32,
    metadata: Metadata,
    /// Insertion sequence, for stable tie-breaking in [`InMemoryVectorStore::search`].
    /// `HashMap` iteration order is randomized per-instance, so ties can't rely on it.
    seq: u64,
}

#[derive(Default)]
struct State {
    namespaces: HashMap<String, HashMap<String, Entry>>,
    count: usize,
    dimension: Option<usize>,
    next_seq: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    vector: Vec<f32>,
    metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    version: String,
    dimension: usize,
    namespaces: BTreeMap<String, BTreeMap<String, PersistedEntry>>,
}

const SNAPSHOT_VERSION: &str = "1.0";

/// In-memory vector store indexed `{namespace → {id → entry}}`, with a
/// pre-computed norm cache and a single global capacity count. Optionally
/// persists a JSON snapshot to disk on every mutation.
pub struct InMemoryVectorStore {
    state: RwLock<State>,
    capacity: Option<usize>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryVectorStore {
    /// Creates an unbounded store with no persistence.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            capacity: None,
            snapshot_path: None,
        }
    }

    /// Caps the total number of stored ids across all namespaces.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Enables JSON snapshot persistence at `path`, loading it immediately if
    /// it exists.
    pub fn with_persistence(mut self, path: impl Into<PathBuf>) -> Result<Self, VectorStoreError> {
        let path = path.into();
        if path.exists() {
            self.load_snapshot(&path)?;
        }
        self.snapshot_path = Some(path);
        Ok(self)
    }

    fn load_snapshot(&mut self, path: &PathBuf) -> Result<(), VectorStoreError> {
        let bytes = std::fs::read(path).map_err(|e| VectorStoreError::State {
            message: format!("failed to read snapshot {}: {e}", path.display()),
        })?;
        let snapshot: PersistedSnapshot = serde_json::from_slice(&bytes).map_err(|e| VectorStoreError::State {
            message: format!("failed to parse snapshot {}: {e}", path.display()),
        })?;

        let state = self.state.get_mut().expect("lock poisoned");
        state.dimension = Some(snapshot.dimension);
        for (ns, entries) in snapshot.namespaces {
            let mut ns_map = HashMap::new();
            for (id, entry) in entries {
                let n = norm(&entry.vector);
                state.count += 1;
                let seq = state.next_seq;
                state.next_seq += 1;
                ns_map.insert(
                    id,
                    Entry {
                        vector: entry.vector,
                        norm: n,
                        metadata: entry.metadata,
                        seq,
                    },
                );
            }
            state.namespaces.insert(ns, ns_map);
        }
        Ok(())
    }

    fn write_snapshot(&self, state: &State) {
        let Some(path) = &self.snapshot_path else { return };

        let namespaces = state
            .namespaces
            .iter()
            .map(|(ns, entries)| {
                let entries = entries
                    .iter()
                    .map(|(id, e)| {
                        (
                            id.clone(),
                            PersistedEntry {
                                vector: e.vector.clone(),
                                metadata: e.metadata.clone(),
                            },
                        )
                    })
                    .collect();
                (ns.clone(), entries)
            })
            .collect();

        let snapshot = PersistedSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            dimension: state.dimension.unwrap_or(0),
            namespaces,
        };

        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    warn!(error = %e, path = %path.display(), "failed to write vector store snapshot");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize vector store snapshot"),
        }
    }

    fn check_dimension(state: &mut State, actual: usize) -> Result<(), VectorStoreError> {
        match state.dimension {
            Some(expected) if expected != actual => Err(VectorStoreError::dimension_mismatch(expected, actual)),
            Some(_) => Ok(()),
            None => {
                state.dimension = Some(actual);
                Ok(())
            }
        }
    }

    fn insert(
        state: &mut State,
        ns: &str,
        id: String,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<(), VectorStoreError> {
        Self::check_dimension(state, vector.len())?;

        let n = norm(&vector);
        let seq = match state.namespaces.get(ns).and_then(|m| m.get(&id)) {
            Some(existing) => existing.seq,
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                seq
            }
        };
        let entries = state.namespaces.entry(ns.to_string()).or_default();
        let is_new = !entries.contains_key(&id);
        entries.insert(id, Entry { vector, norm: n, metadata, seq });
        if is_new {
            state.count += 1;
        }
        Ok(())
    }

    fn search(
        state: &State,
        query: &[f32],
        limit: usize,
        threshold: Option<f32>,
        ns: &str,
        filters: Option<&FilterMap>,
    ) -> Vec<VectorMatch> {
        let Some(entries) = state.namespaces.get(ns) else {
            return Vec::new();
        };
        let query_norm = norm(query);

        let mut matches: Vec<(VectorMatch, u64)> = entries
            .iter()
            .filter(|(_, e)| filters.is_none_or(|f| matches_all(&e.metadata, f)))
            .filter_map(|(id, e)| {
                let score = cosine_with_norms(query, query_norm, &e.vector, e.norm);
                if threshold.is_some_and(|t| score < t) {
                    return None;
                }
                Some((
                    VectorMatch {
                        id: id.clone(),
                        score,
                        metadata: e.metadata.clone(),
                    },
                    e.seq,
                ))
            })
            .collect();

        // Ties preserve insertion order; `HashMap` iteration order is not it,
        // so sort on the explicit sequence recorded at insert time.
        matches.sort_by(|(a, a_seq), (b, b_seq)| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a_seq.cmp(b_seq))
        });
        matches.truncate(limit);
        matches.into_iter().map(|(m, _)| m).collect()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_with_norms(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if a.len() != b.len() || norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn store_embedding(
        &self,
        id: &str,
        embedding: Vec<f32>,
        metadata: Option<Metadata>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        let mut state = self.state.write().expect("lock poisoned");

        let is_new = !state.namespaces.get(ns).is_some_and(|m| m.contains_key(id));
        if is_new && let Some(capacity) = self.capacity
            && state.count >= capacity
        {
            return Err(VectorStoreError::State {
                message: format!("capacity exceeded: {capacity}"),
            });
        }

        Self::insert(&mut state, ns, id.to_string(), embedding, metadata.unwrap_or_default())?;
        self.write_snapshot(&state);
        Ok(())
    }

    async fn store_embedding_batch(
        &self,
        items: Vec<(String, Vec<f32>, Option<Metadata>)>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        let mut state = self.state.write().expect("lock poisoned");

        for (id, vector, metadata) in items {
            let is_new = !state.namespaces.get(ns).is_some_and(|m| m.contains_key(&id));
            if is_new && let Some(capacity) = self.capacity
                && state.count >= capacity
            {
                return Err(VectorStoreError::State {
                    message: format!("capacity exceeded: {capacity}"),
                });
            }
            Self::insert(&mut state, ns, id, vector, metadata.unwrap_or_default())?;
        }
        self.write_snapshot(&state);
        Ok(())
    }

    async fn find_similar(
        &self,
        query_embedding: &[f32],
        limit: usize,
        threshold: Option<f32>,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let ns = resolve_namespace(ns);
        let state = self.state.read().expect("lock poisoned");
        Ok(Self::search(&state, query_embedding, limit, threshold, ns, filters))
    }

    async fn delete(&self, id: &str, ns: Option<&str>) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(entries) = state.namespaces.get_mut(ns)
            && entries.remove(id).is_some()
        {
            state.count = state.count.saturating_sub(1);
        }
        self.write_snapshot(&state);
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String], ns: Option<&str>) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(entries) = state.namespaces.get_mut(ns) {
            for id in ids {
                if entries.remove(id).is_some() {
                    state.count = state.count.saturating_sub(1);
                }
            }
        }
        self.write_snapshot(&state);
        Ok(())
    }

    async fn exists(&self, id: &str, ns: Option<&str>) -> Result<bool, VectorStoreError> {
        let ns = resolve_namespace(ns);
        let state = self.state.read().expect("lock poisoned");
        Ok(state.namespaces.get(ns).is_some_and(|m| m.contains_key(id)))
    }

    async fn get_embedding(&self, id: &str, ns: Option<&str>) -> Result<Option<Vec<f32>>, VectorStoreError> {
        let ns = resolve_namespace(ns);
        let state = self.state.read().expect("lock poisoned");
        Ok(state.namespaces.get(ns).and_then(|m| m.get(id)).map(|e| e.vector.clone()))
    }

    async fn create_namespace(&self, ns: &str) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().expect("lock poisoned");
        state.namespaces.entry(ns.to_string()).or_default();
        Ok(())
    }

    async fn delete_namespace(&self, ns: &str) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(removed) = state.namespaces.remove(ns) {
            state.count = state.count.saturating_sub(removed.len());
        }
        self.write_snapshot(&state);
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, VectorStoreError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.namespaces.keys().cloned().collect())
    }

    async fn upsert_document(&self, document: VectorDocument, ns: Option<&str>) -> Result<(), VectorStoreError> {
        if document.vector.is_empty() {
            return Err(VectorStoreError::Validation {
                message: format!("document '{}' has no embedding", document.id),
            });
        }
        self.store_embedding(&document.id, document.vector, Some(document.metadata), ns)
            .await
    }

    async fn upsert_document_batch(
        &self,
        documents: Vec<VectorDocument>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        for document in &documents {
            if document.vector.is_empty() {
                return Err(VectorStoreError::Validation {
                    message: format!("document '{}' has no embedding", document.id),
                });
            }
        }
        let items = documents
            .into_iter()
            .map(|d| (d.id, d.vector, Some(d.metadata)))
            .collect();
        self.store_embedding_batch(items, ns).await
    }

    async fn get_document(&self, id: &str, ns: Option<&str>) -> Result<Option<VectorDocument>, VectorStoreError> {
        let ns = resolve_namespace(ns);
        let state = self.state.read().expect("lock poisoned");
        Ok(state.namespaces.get(ns).and_then(|m| m.get(id)).map(|e| VectorDocument {
            id: id.to_string(),
            vector: e.vector.clone(),
            metadata: e.metadata.clone(),
        }))
    }

    async fn find_similar_documents(
        &self,
        query_embedding: &[f32],
        limit: usize,
        threshold: Option<f32>,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        self.find_similar(query_embedding, limit, threshold, ns, filters).await
    }

    async fn close(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}
