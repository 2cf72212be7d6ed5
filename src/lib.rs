//! # Reflex
//!
//! An LLM orchestration library: retrieval-augmented generation over a
//! pluggable vector store, multi-provider routing with circuit breaking and
//! fan-out, and MCP tool federation (auth, capability discovery, health).
//!
//! ```text
//! Document → chunk → embed → vector store ─┐
//!                                           ├─ retrieval (cache/rerank) → provider
//! MCP client ── auth/capability/health ─────┘         ↑
//!                                          router/balancer/circuit breaker
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use reflex::Config;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! config.validate()?;
//! println!("Qdrant at {}", config.qdrant_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `mock` | Mock backends for tests/examples |
//!
//! ## Modules
//!
//! - [`document`] / [`chunker`] - document model and language-aware chunking (C2, C3)
//! - [`embedding`] - embedding vector primitives and a local embedding generator (C1)
//! - [`vectordb`] - namespace-scoped vector store contract, in-memory and Qdrant backends (C5)
//! - [`retrieval`] - batch embedding, caching, hybrid search, reranking (C4, C6)
//! - [`provider`] - LLM provider and MCP client contracts (§6)
//! - [`circuit`] - per-endpoint failure gate (C7)
//! - [`scheduler`] - priority task scheduler with a concurrency gate (C8)
//! - [`batching`] - JSON-RPC batch request manager (C9)
//! - [`routing`] - keyword/property routing, weighted balancing, bounded pools (C10)
//! - [`fanout`] - parallel fan-out with result-merging strategies (C11)
//! - [`mcp`] - MCP auth, capability discovery, health (C12-C14)
//! - [`error`] - crate-wide error taxonomy and dispatcher (C15)
//! - [`config`] - environment-backed configuration
//! - [`storage`] - session/message storage contract (§6)
//! - [`value`] - dynamically-typed metadata and filter descriptors
//!
//! Links: repo/issues at the crate `repository` URL.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// JSON-RPC batch request manager (C9).
pub mod batching;
/// Language-aware text chunking with overlap (C3).
pub mod chunker;
/// Per-endpoint failure gate with closed/open/half-open states (C7).
pub mod circuit;
pub mod config;
pub mod constants;
/// Document model & in-memory store (C2).
pub mod document;
/// Embedding vector primitives and a local embedding generator (C1).
pub mod embedding;
/// Crate-wide error taxonomy and dispatcher (C15).
pub mod error;
/// Parallel fan-out across services with result-merging strategies (C11).
pub mod fanout;
/// Model Context Protocol auth, capability, and health adapters (C12-C14).
pub mod mcp;
/// LLM provider and MCP client contracts, plus test doubles (§6).
pub mod provider;
/// Retrieval-augmented generation: caching, hybrid search, reranking (C4, C6).
pub mod retrieval;
/// Keyword/property routing, weighted balancing, and bounded client pools (C10).
pub mod routing;
/// Priority task scheduler with a max-concurrency gate (C8).
pub mod scheduler;
/// Session/message storage contract (§6).
pub mod storage;
/// Dynamically-typed metadata and filter descriptors.
pub mod value;
/// Namespace-scoped vector store contract, in-memory and Qdrant backends (C5).
pub mod vectordb;

pub use batching::{
    BatchRequestManager, BatchRequestManagerError, BatchStatistics, JsonRpcErrorObject,
    JsonRpcRequest, JsonRpcResponse,
};
pub use chunker::{
    Chunk, ChunkConfig, ChunkerError, Language, chunk_batch, chunk_document, detect_language,
};
pub use circuit::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerSettings, CircuitBreakerStatus,
    CircuitState, TransitionCallback,
};
pub use config::{AuthConfig, Config, ConfigError};
pub use constants::{DEFAULT_BATCH_EMBEDDING_WINDOW, DimConfig, DimValidationError, validate_embedding_dim};
pub use document::{Document, DocumentCollection, DocumentError, DocumentStore, ScoredDocument};
pub use embedding::{EmbeddingError, SINTER_EMBEDDING_DIM, SINTER_MAX_SEQ_LEN, SinterConfig, SinterEmbedder};
pub use error::{ClassifiedError, ErrorHandler, ErrorKind};
pub use fanout::{AggregationStrategy, FanOutError, FanOutManager, FanOutResult};
pub use mcp::auth::{ApiKeyValidator, AuthContext, AuthResult, McpAuthAdapter, TokenValidator};
pub use mcp::capability::{CapabilityEvent, CapabilityManager, CapabilitySet};
pub use mcp::health::{HealthMonitor, HealthStatus, ServiceHealth};
pub use provider::{CompletionRequest, CompletionResponse, LlmProvider, McpClient, McpEntry, StreamChunk};
pub use retrieval::{
    BatchEmbeddingProcessor, RetrievalBackend, RetrievalCache, RetrievalError, RetrievalManager,
    RetrievedDocument,
};
pub use routing::{PoolError, ServiceBalancer, ServiceClientPool, ServiceRouter};
pub use scheduler::{ScheduledResult, Scheduler, TaskCancelledError};
pub use storage::{MockStorage, Storage, StorageError, StoredMessage};
pub use value::{
    FilterDescriptor, FilterMap, FilterOperator, FilterValue, Metadata, MetadataValue, matches_all,
};
pub use vectordb::{DEFAULT_NAMESPACE, InMemoryVectorStore, QdrantVectorStore, VectorDocument, VectorMatch, VectorStore, VectorStoreError};
