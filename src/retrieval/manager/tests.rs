use std::sync::Arc;

use super::*;
use crate::document::DocumentCollection;
use crate::provider::mock::MockLlmProvider;
use crate::vectordb::InMemoryVectorStore;

fn doc(id: &str, title: &str, content: &str) -> Document {
    let mut d = Document::new(Some(id.to_string()), title, content);
    d.updated_at = now_ms();
    d
}

fn documents_manager(provider: Arc<MockLlmProvider>) -> RetrievalManager<MockLlmProvider> {
    let store = Arc::new(DocumentStore::new());
    RetrievalManager::new(RetrievalBackend::Documents(store), provider)
}

fn vectors_manager(provider: Arc<MockLlmProvider>) -> RetrievalManager<MockLlmProvider> {
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    RetrievalManager::new(RetrievalBackend::Vectors(store), provider)
}

#[tokio::test]
async fn retrieve_relevant_finds_added_document_over_documents_backend() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = documents_manager(provider);

    manager.add_document(doc("a", "Rust Guide", "systems programming"), None).await.unwrap();

    let results = manager.retrieve_relevant("systems programming", 5, None, None, None, false).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
}

#[tokio::test]
async fn retrieve_relevant_finds_added_document_over_vectors_backend() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = vectors_manager(provider);

    manager.add_document(doc("a", "Rust Guide", "systems programming"), None).await.unwrap();

    let results = manager.retrieve_relevant("systems programming", 5, None, None, None, false).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
    assert_eq!(results[0].title, "Rust Guide");
}

#[tokio::test]
async fn retrieve_relevant_uses_cache_on_second_call() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = documents_manager(provider);
    manager.add_document(doc("a", "Rust Guide", "systems programming"), None).await.unwrap();

    let first = manager.retrieve_relevant("systems programming", 5, None, None, None, true).await.unwrap();
    manager.delete_document("a", None).await.unwrap();
    let second = manager.retrieve_relevant("systems programming", 5, None, None, None, true).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn hybrid_search_merges_semantic_and_keyword_hits() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = documents_manager(provider);
    manager.add_document(doc("a", "Rust Guide", "rust systems programming"), None).await.unwrap();
    manager.add_document(doc("b", "Cooking Tips", "rust systems programming"), None).await.unwrap();

    let results = manager
        .hybrid_search("rust systems programming", 5, 5, 5, 0.5, None, None)
        .await
        .unwrap();

    assert!(!results.is_empty());
}

#[tokio::test]
async fn context_aware_search_falls_through_without_history() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = documents_manager(provider);
    manager.add_document(doc("a", "Rust Guide", "systems programming"), None).await.unwrap();

    let results = manager.context_aware_search("systems programming", &[], 5, None, None).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn context_aware_search_expands_with_history() {
    let provider = Arc::new(
        MockLlmProvider::new(8).with_response("expand me", "rewritten systems programming query"),
    );
    let manager = documents_manager(provider);
    manager.add_document(doc("a", "Rust Guide", "systems programming"), None).await.unwrap();

    let results = manager
        .context_aware_search("expand me", &["previous query".to_string()], 5, None, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn time_weighted_retrieval_prefers_recent_documents() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = documents_manager(provider);
    let mut old = doc("old", "Topic", "systems programming topic");
    old.updated_at = now_ms() - 1_000_000;
    let fresh = doc("fresh", "Topic", "systems programming topic");
    manager.add_document(old, None).await.unwrap();
    manager.add_document(fresh, None).await.unwrap();

    let results = manager
        .time_weighted_retrieval("systems programming topic", 2, None, None, 0.9, 10_000)
        .await
        .unwrap();

    assert_eq!(results[0].id, "fresh");
}

#[tokio::test]
async fn multi_collection_search_concatenates_across_collections() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let store = Arc::new(DocumentStore::new());
    store.create_collection(DocumentCollection::new(Some("c1".to_string()), "one"));
    store.create_collection(DocumentCollection::new(Some("c2".to_string()), "two"));
    let manager = RetrievalManager::new(RetrievalBackend::Documents(store.clone()), provider.clone());

    let mut a = doc("a", "A", "systems programming");
    a.collection_id = Some("c1".to_string());
    let mut b = doc("b", "B", "systems programming");
    b.collection_id = Some("c2".to_string());
    manager.add_document(a, None).await.unwrap();
    manager.add_document(b, None).await.unwrap();

    let results = manager
        .multi_collection_search("systems programming", &["c1".to_string(), "c2".to_string()], 5, false)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn retrieve_and_generate_falls_back_to_apology_on_provider_error() {
    struct FailingProvider(MockLlmProvider);

    impl crate::provider::LlmProvider for FailingProvider {
        async fn initialize(&self) -> Result<(), crate::provider::error::ProviderError> {
            Ok(())
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<crate::provider::CompletionResponse, crate::provider::error::ProviderError> {
            Err(crate::provider::error::ProviderError::CallFailed("down".to_string()))
        }
        async fn stream_complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<Vec<crate::provider::StreamChunk>, crate::provider::error::ProviderError> {
            Ok(vec![])
        }
        async fn get_embeddings(&self, text: &str) -> Result<Vec<f32>, crate::provider::error::ProviderError> {
            self.0.get_embeddings(text).await
        }
        async fn close(&self) -> Result<(), crate::provider::error::ProviderError> {
            Ok(())
        }
    }

    let provider = Arc::new(FailingProvider(MockLlmProvider::new(8)));
    let manager = documents_manager_with(provider);
    manager.add_document(doc("a", "Rust Guide", "systems programming"), None).await.unwrap();

    let answer = manager.retrieve_and_generate("systems programming", 5, None, None).await.unwrap();
    assert_eq!(answer, APOLOGY);
}

fn documents_manager_with<P: LlmProvider>(provider: Arc<P>) -> RetrievalManager<P> {
    let store = Arc::new(DocumentStore::new());
    RetrievalManager::new(RetrievalBackend::Documents(store), provider)
}

#[tokio::test]
async fn retrieve_and_generate_returns_no_context_answer_when_empty() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = documents_manager(provider);

    let answer = manager.retrieve_and_generate("nothing matches this", 5, None, None).await.unwrap();
    assert!(answer.starts_with("echo:"));
}

#[tokio::test]
async fn delete_document_removes_from_vector_backend() {
    let provider = Arc::new(MockLlmProvider::new(8));
    let manager = vectors_manager(provider);
    manager.add_document(doc("a", "Rust Guide", "systems programming"), None).await.unwrap();

    manager.delete_document("a", None).await.unwrap();

    let results = manager.retrieve_relevant("systems programming", 5, None, None, None, false).await.unwrap();
    assert!(results.is_empty());
}
