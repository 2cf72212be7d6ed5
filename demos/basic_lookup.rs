//! Basic retrieval flow: embed a document, store it, and retrieve it back
//! by semantic similarity.

use anyhow::Result;

#[cfg(feature = "mock")]
#[tokio::main]
async fn main() -> Result<()> {
    use std::sync::Arc;

    use reflex::provider::mock::MockLlmProvider;
    use reflex::retrieval::manager::RetrievalBackend;
    use reflex::{Document, InMemoryVectorStore, RetrievalManager, VectorStore};

    let provider = Arc::new(MockLlmProvider::new(32));
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let manager = RetrievalManager::new(RetrievalBackend::Vectors(store), provider);

    manager
        .add_document(Document::new(None, "hello", "hello, world"), None)
        .await?;

    let hits = manager.retrieve_relevant("hello", 1, None, None, None, false).await?;
    match hits.first() {
        Some(doc) => println!("hit: {} (score {:.3})", doc.id, doc.score),
        None => println!("miss"),
    }

    Ok(())
}

#[cfg(not(feature = "mock"))]
fn main() {
    eprintln!("Run with: cargo run --example basic_lookup --features mock");
}

