//! Namespace-scoped [`VectorStore`] contract (C5), an in-memory reference
//! backend, and a Qdrant-backed remote one.

pub mod memory;
pub mod qdrant;
pub mod store;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;
pub use store::{DEFAULT_NAMESPACE, VectorDocument, VectorMatch, VectorStore, VectorStoreError};
