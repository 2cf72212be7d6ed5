use std::sync::Arc;

use super::*;
use crate::provider::ProviderError;

/// A provider returning a fixed response, or failing, for fan-out tests.
struct StubProvider {
    text: String,
    confidence: Option<f64>,
    fail: bool,
}

impl StubProvider {
    fn ok(text: impl Into<String>) -> Self {
        Self { text: text.into(), confidence: None, fail: false }
    }

    fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    fn failing() -> Self {
        Self { text: String::new(), confidence: None, fail: true }
    }
}

impl LlmProvider for StubProvider {
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if self.fail {
            return Err(ProviderError::CallFailed("stub failure".to_string()));
        }
        let mut metadata = HashMap::new();
        if let Some(confidence) = self.confidence {
            metadata.insert("confidence".to_string(), MetadataValue::Float(confidence));
        }
        Ok(CompletionResponse { text: self.text.clone(), metadata })
    }

    async fn stream_complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<Vec<crate::provider::StreamChunk>, ProviderError> {
        unimplemented!("not exercised by fan-out tests")
    }

    async fn get_embeddings(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        unimplemented!("not exercised by fan-out tests")
    }

    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

async fn manager_with(services: Vec<(&str, StubProvider)>) -> FanOutManager<StubProvider> {
    let manager = FanOutManager::new();
    for (id, provider) in services {
        manager.register_service(id, Arc::new(provider)).await;
    }
    manager
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn empty_service_list_is_rejected() {
    let manager: FanOutManager<StubProvider> = FanOutManager::new();
    let result = manager
        .fan_out(CompletionRequest::new("q"), &[], AggregationStrategy::First)
        .await;
    assert_eq!(result, Err(FanOutError::NoServicesRequested));
}

#[tokio::test]
async fn first_strategy_keeps_request_order() {
    let manager = manager_with(vec![("a", StubProvider::ok("alpha")), ("b", StubProvider::ok("beta"))]).await;
    let result = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "b"]), AggregationStrategy::First)
        .await
        .unwrap();
    assert_eq!(result.text, "alpha");
}

#[tokio::test]
async fn shortest_and_longest_pick_by_text_length() {
    let manager = manager_with(vec![
        ("a", StubProvider::ok("a very long response indeed")),
        ("b", StubProvider::ok("short")),
    ])
    .await;

    let shortest = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "b"]), AggregationStrategy::Shortest)
        .await
        .unwrap();
    assert_eq!(shortest.text, "short");

    let longest = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "b"]), AggregationStrategy::Longest)
        .await
        .unwrap();
    assert_eq!(longest.text, "a very long response indeed");
}

#[tokio::test]
async fn confidence_strategy_picks_the_highest_scoring_response() {
    let manager = manager_with(vec![
        ("a", StubProvider::ok("low").with_confidence(0.2)),
        ("b", StubProvider::ok("high").with_confidence(0.9)),
        ("c", StubProvider::ok("unscored")),
    ])
    .await;

    let result = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "b", "c"]), AggregationStrategy::Confidence)
        .await
        .unwrap();
    assert_eq!(result.text, "high");
}

#[tokio::test]
async fn merge_strategy_concatenates_text_and_unions_metadata() {
    let manager = manager_with(vec![
        ("a", StubProvider::ok("alpha").with_confidence(0.5)),
        ("b", StubProvider::ok("beta")),
    ])
    .await;

    let result = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "b"]), AggregationStrategy::Merge)
        .await
        .unwrap();
    assert!(result.text.contains("alpha"));
    assert!(result.text.contains("beta"));
    assert_eq!(result.metadata.get("confidence"), Some(&MetadataValue::Float(0.5)));
}

#[tokio::test]
async fn per_service_failure_yields_an_absent_entry_but_others_still_aggregate() {
    let manager = manager_with(vec![("a", StubProvider::failing()), ("b", StubProvider::ok("beta"))]).await;

    let result = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "b"]), AggregationStrategy::First)
        .await
        .unwrap();

    assert_eq!(result.text, "beta");
    assert_eq!(result.responses.len(), 2);
    assert!(result.responses[0].1.is_none());
    assert!(result.responses[1].1.is_some());
}

#[tokio::test]
async fn unregistered_service_id_is_treated_as_an_absent_entry() {
    let manager = manager_with(vec![("a", StubProvider::ok("alpha"))]).await;
    let result = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "missing"]), AggregationStrategy::Merge)
        .await
        .unwrap();
    assert_eq!(result.text, "alpha");
    assert_eq!(result.responses.len(), 2);
}

#[tokio::test]
async fn all_services_failing_returns_an_explicit_empty_result() {
    let manager = manager_with(vec![("a", StubProvider::failing()), ("b", StubProvider::failing())]).await;
    let result = manager
        .fan_out(CompletionRequest::new("q"), &ids(&["a", "b"]), AggregationStrategy::Merge)
        .await
        .unwrap();
    assert_eq!(result.text, "");
    assert!(result.metadata.is_empty());
    assert_eq!(result.responses.len(), 2);
}
