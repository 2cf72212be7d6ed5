//! Sinter embedder.
//!
//! A local embedding provider used as the default, offline-friendly backend
//! for [`crate::provider::LlmProvider`]. It currently always produces
//! deterministic stub embeddings (a seeded pseudo-random walk hashed from the
//! input text, then L2-normalized) rather than running a real transformer;
//! wiring in a real on-disk model is future work, tracked by
//! [`SinterConfig::model_path`]. Output is stable across calls for identical
//! input, which is sufficient for the retrieval cache, rerank, and test
//! fixtures that consume it.

pub mod config;

#[cfg(test)]
mod tests;

pub use config::{SINTER_EMBEDDING_DIM, SINTER_MAX_SEQ_LEN, SinterConfig};

use tracing::{debug, warn};

use crate::embedding::error::EmbeddingError;

/// Embedding generator for semantic search (stub-mode only; see module docs).
pub struct SinterEmbedder {
    config: SinterConfig,
}

impl std::fmt::Debug for SinterEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinterEmbedder")
            .field("embedding_dim", &self.config.embedding_dim)
            .field("max_seq_len", &self.config.max_seq_len)
            .finish()
    }
}

impl SinterEmbedder {
    /// Loads the embedder from a config.
    pub fn load(config: SinterConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        if !config.testing_stub {
            warn!(
                "Sinter has no real local-model backend wired in yet; \
                 falling back to deterministic stub embeddings"
            );
        }

        Ok(Self { config })
    }

    /// Generates an embedding for a single string.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_stub(text)
    }

    /// Generates embeddings for a batch of strings.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed_stub(text)).collect()
    }

    fn embed_stub(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        debug!(text_len = text.len(), "Generating stub embedding");

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.config.embedding_dim);
        let mut state = seed;

        for _ in 0..self.config.embedding_dim {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            embedding.push(value);
        }

        Ok(crate::embedding::vector::normalize(&embedding))
    }

    /// Returns the configured output embedding dimension.
    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    /// Returns `true` if running in stub mode (always `true` today).
    pub fn is_stub(&self) -> bool {
        true
    }

    /// Returns the embedder configuration.
    pub fn config(&self) -> &SinterConfig {
        &self.config
    }
}
