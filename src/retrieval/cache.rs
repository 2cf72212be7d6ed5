//! Retrieval result cache (C6 caching).
//!
//! A `moka`-backed exact-match cache keyed on query text, capped at a fixed
//! entry count.

#[cfg(test)]
mod tests;

use moka::sync::Cache;

use super::types::RetrievedDocument;

const DEFAULT_CAPACITY: u64 = 1_000;

#[derive(Clone)]
struct CachedEntry {
    documents: Vec<RetrievedDocument>,
    /// `None` means this entry was cached unbounded (`useCache` with no `topK`).
    top_k: Option<usize>,
}

/// LRU-ish cache of ranked retrieval results, keyed by `lower(trim(query))
/// + ":" + (topK ?? "all")` (spec §4.6).
///
/// A request for a smaller `topK` than a cached unbounded entry is served by
/// slicing that entry; requests are never served by *widening* a smaller
/// cached entry.
pub struct RetrievalCache {
    entries: Cache<String, CachedEntry>,
}

impl RetrievalCache {
    /// Creates a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a cache capped at `capacity` entries.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    fn key(query: &str, top_k: Option<usize>) -> String {
        let normalized = query.trim().to_lowercase();
        match top_k {
            Some(k) => format!("{normalized}:{k}"),
            None => format!("{normalized}:all"),
        }
    }

    /// Looks up a cached result for `(query, top_k)`. Falls back to an
    /// unbounded cached entry for the same query, sliced to `top_k`, if the
    /// exact key isn't present.
    pub fn get(&self, query: &str, top_k: Option<usize>) -> Option<Vec<RetrievedDocument>> {
        let exact_key = Self::key(query, top_k);
        if let Some(entry) = self.entries.get(&exact_key) {
            return Some(entry.documents);
        }

        if let Some(k) = top_k {
            let unbounded_key = Self::key(query, None);
            if let Some(entry) = self.entries.get(&unbounded_key)
                && entry.documents.len() >= k
            {
                return Some(entry.documents[..k].to_vec());
            }
        }

        None
    }

    /// Stores `documents` for `(query, top_k)`. The stored copy is
    /// independent of the caller's `Vec` (prevents aliasing).
    pub fn put(&self, query: &str, top_k: Option<usize>, documents: &[RetrievedDocument]) {
        let key = Self::key(query, top_k);
        self.entries.insert(
            key,
            CachedEntry {
                documents: documents.to_vec(),
                top_k,
            },
        );
    }

    /// Removes every cached entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Number of cached entries.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// `true` iff the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Runs `moka`'s pending maintenance tasks (test/diagnostic use: entry
    /// counts otherwise update asynchronously).
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl Default for RetrievalCache {
    fn default() -> Self {
        Self::new()
    }
}
