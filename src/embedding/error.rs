use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by embedding generation and configuration.
pub enum EmbeddingError {
    /// A configured model path does not exist.
    #[error("embedding model not found at path: {path}")]
    ModelNotFound {
        /// Missing model path.
        path: PathBuf,
    },

    /// Configuration is invalid.
    #[error("invalid embedding configuration: {reason}")]
    InvalidConfig {
        /// Error message.
        reason: String,
    },
}
