use std::path::PathBuf;

use crate::embedding::error::EmbeddingError;

/// Default Sinter embedding dimension.
pub const SINTER_EMBEDDING_DIM: usize = crate::constants::DEFAULT_EMBEDDING_DIM;

/// Default Sinter max sequence length.
pub const SINTER_MAX_SEQ_LEN: usize = crate::constants::DEFAULT_MAX_SEQ_LEN;

#[derive(Debug, Clone)]
/// Configuration for [`SinterEmbedder`](super::SinterEmbedder).
///
/// `model_path` is currently informational only — the embedder always runs
/// in deterministic stub mode (see the module docs). It is kept on the
/// config so a real local-model backend can be wired in later without
/// changing callers.
pub struct SinterConfig {
    /// Path to a local embedding model, if one is configured.
    pub model_path: Option<PathBuf>,
    /// Max tokens to consider.
    pub max_seq_len: usize,
    /// Output embedding dimension.
    pub embedding_dim: usize,
    /// If true, run in deterministic stub mode (no model files required).
    pub testing_stub: bool,
}

impl Default for SinterConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            max_seq_len: SINTER_MAX_SEQ_LEN,
            embedding_dim: SINTER_EMBEDDING_DIM,
            testing_stub: true,
        }
    }
}

impl SinterConfig {
    /// Env var used to locate a local model file.
    pub const ENV_MODEL_PATH: &'static str = "REFLEX_MODEL_PATH";

    /// Loads config from environment variables (missing value means stub mode).
    pub fn from_env() -> Result<Self, EmbeddingError> {
        let model_path = std::env::var(Self::ENV_MODEL_PATH)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let testing_stub = model_path.is_none();

        Ok(Self {
            model_path,
            testing_stub,
            ..Default::default()
        })
    }

    /// Creates a config referencing a model path (kept for forward compatibility
    /// with a real local-model backend; still runs in stub mode today).
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: Some(model_path.into()),
            testing_stub: false,
            ..Default::default()
        }
    }

    /// Creates a stub config (no model files; produces deterministic embeddings).
    pub fn stub() -> Self {
        Self {
            testing_stub: true,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.embedding_dim == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "embedding_dim must be nonzero".to_string(),
            });
        }

        if !self.testing_stub
            && let Some(path) = &self.model_path
            && !path.exists()
        {
            return Err(EmbeddingError::ModelNotFound { path: path.clone() });
        }

        Ok(())
    }

    /// Returns `true` if a model path is configured and exists.
    pub fn model_available(&self) -> bool {
        self.model_path.as_ref().is_some_and(|p| p.exists())
    }
}
