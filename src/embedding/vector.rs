//! Embedding & similarity primitives (C1).
//!
//! A fixed-length float vector plus the pairwise and aggregate operations the
//! rest of the crate is built on: cosine/Euclidean/dot, normalization,
//! weighted averaging, and a little-endian binary/base64 codec.

use base64::Engine;
use thiserror::Error;

/// Errors raised by embedding primitive operations.
#[derive(Debug, Error, PartialEq)]
pub enum VectorError {
    /// Two vectors were compared/combined with mismatched dimensions.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A binary-encoded embedding did not contain a whole number of floats.
    #[error("invalid embedding byte length {len}: not a multiple of 4")]
    InvalidByteLength { len: usize },

    /// Base64 decoding failed.
    #[error("invalid base64 embedding: {0}")]
    InvalidBase64(String),

    /// An operation was attempted over an empty set of vectors.
    #[error("no vectors supplied")]
    Empty,

    /// Weights supplied to `average` did not match the number of vectors.
    #[error("expected {expected} weights, got {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },
}

/// Cosine similarity. Returns `0.0` when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    require_equal_len(a, b)?;

    let dot = dot(a, b)?;
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a * norm_b))
}

/// Euclidean (L2) distance.
pub fn euclidean(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    require_equal_len(a, b)?;

    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt())
}

/// Dot product.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    require_equal_len(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// L2 norm.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalizes `v` to unit length; returns the zero vector unchanged if its
/// norm is `0`.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / n).collect()
}

/// Weighted average of embeddings. Uses equal weights if `weights` is
/// `None`; weights are sum-normalized before use.
pub fn average(embeddings: &[Vec<f32>], weights: Option<&[f32]>) -> Result<Vec<f32>, VectorError> {
    if embeddings.is_empty() {
        return Err(VectorError::Empty);
    }

    let dim = embeddings[0].len();
    for e in embeddings {
        if e.len() != dim {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                actual: e.len(),
            });
        }
    }

    let weights: Vec<f32> = match weights {
        Some(w) => {
            if w.len() != embeddings.len() {
                return Err(VectorError::WeightCountMismatch {
                    expected: embeddings.len(),
                    actual: w.len(),
                });
            }
            w.to_vec()
        }
        None => vec![1.0; embeddings.len()],
    };

    let total: f32 = weights.iter().sum();
    let normalized_weights: Vec<f32> = if total == 0.0 {
        vec![1.0 / weights.len() as f32; weights.len()]
    } else {
        weights.iter().map(|w| w / total).collect()
    };

    let mut result = vec![0.0f32; dim];
    for (embedding, weight) in embeddings.iter().zip(normalized_weights.iter()) {
        for (acc, value) in result.iter_mut().zip(embedding.iter()) {
            *acc += value * weight;
        }
    }

    Ok(result)
}

/// Encodes an embedding as little-endian IEEE-754 32-bit floats.
pub fn to_binary(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decodes a little-endian IEEE-754 32-bit float embedding. Dimension is
/// inferred as `len/4`.
pub fn from_binary(bytes: &[u8]) -> Result<Vec<f32>, VectorError> {
    if !bytes.len().is_multiple_of(4) {
        return Err(VectorError::InvalidByteLength { len: bytes.len() });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encodes an embedding as base64 of its binary form.
pub fn to_base64(v: &[f32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(to_binary(v))
}

/// Decodes a base64-encoded embedding.
pub fn from_base64(s: &str) -> Result<Vec<f32>, VectorError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| VectorError::InvalidBase64(e.to_string()))?;
    from_binary(&bytes)
}

/// Computes the symmetric pairwise cosine-similarity matrix for `vectors`.
/// Only the upper triangle is computed; the result is mirrored, and the
/// diagonal is always `1.0` for nonzero vectors (`0.0` for zero vectors,
/// matching [`cosine`]'s self-similarity convention).
pub fn pairwise_similarity_matrix(vectors: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, VectorError> {
    let n = vectors.len();
    let mut matrix = vec![vec![0.0f32; n]; n];

    for i in 0..n {
        for j in i..n {
            let score = cosine(&vectors[i], &vectors[j])?;
            matrix[i][j] = score;
            matrix[j][i] = score;
        }
    }

    Ok(matrix)
}

fn require_equal_len(a: &[f32], b: &[f32]) -> Result<(), VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}
