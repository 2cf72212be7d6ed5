//! Embedding vector primitives and a local embedding generator.
//!
//! - [`vector`] implements cosine/euclidean/dot similarity, normalization,
//!   weighted averaging, and the binary/base64 codec (C1).
//! - [`sinter`] is a concrete, offline-friendly [`crate::provider::LlmProvider`]
//!   embedding backend.

mod error;
/// Local embedding generator (stub-mode only; see module docs).
pub mod sinter;
/// Embedding vector primitives: distance, normalization, binary/base64 codec (C1).
pub mod vector;

pub use error::EmbeddingError;
pub use sinter::{SINTER_EMBEDDING_DIM, SINTER_MAX_SEQ_LEN, SinterConfig, SinterEmbedder};
pub use vector::VectorError;
