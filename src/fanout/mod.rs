//! Multi-provider fan-out and response aggregation (C11).

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider};
use crate::value::MetadataValue;

/// How [`FanOutManager::fan_out`] collapses multiple responses into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    /// The first service's response, by request order.
    First,
    /// The response with the shortest text.
    Shortest,
    /// The response with the longest text.
    Longest,
    /// The response with the highest `metadata.confidence` (default `0.0`).
    Confidence,
    /// Every response's text concatenated, with metadata unioned.
    Merge,
}

/// Errors raised by [`FanOutManager::fan_out`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FanOutError {
    /// `fan_out` was called with an empty service list.
    #[error("fan_out requires at least one service id")]
    NoServicesRequested,
}

/// One service's outcome: `None` if the call failed or the id was
/// unregistered.
pub type ServiceOutcome = (String, Option<CompletionResponse>);

/// The aggregated result of a fan-out call.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutResult {
    /// Aggregated text, per the chosen [`AggregationStrategy`].
    pub text: String,
    /// Aggregated metadata.
    pub metadata: HashMap<String, MetadataValue>,
    /// Every requested service's raw outcome, in request order.
    pub responses: Vec<ServiceOutcome>,
}

impl FanOutResult {
    fn empty(responses: Vec<ServiceOutcome>) -> Self {
        Self { text: String::new(), metadata: HashMap::new(), responses }
    }
}

/// Broadcasts a completion request across a named set of providers in
/// parallel and aggregates their responses.
#[derive(Default)]
pub struct FanOutManager<P: LlmProvider> {
    services: RwLock<HashMap<String, Arc<P>>>,
}

impl<P: LlmProvider + 'static> FanOutManager<P> {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self { services: RwLock::new(HashMap::new()) }
    }

    /// Registers `provider` under `service_id`, replacing any prior entry.
    pub async fn register_service(&self, service_id: impl Into<String>, provider: Arc<P>) {
        self.services.write().await.insert(service_id.into(), provider);
    }

    /// Removes a registered service.
    pub async fn unregister_service(&self, service_id: &str) {
        self.services.write().await.remove(service_id);
    }

    /// Invokes `request` against every id in `service_ids` in parallel,
    /// tolerating per-service failure as an absent entry, then aggregates
    /// the surviving responses via `strategy`. An all-failed (or all
    /// unregistered) set yields an explicit empty [`FanOutResult`] rather
    /// than an error.
    pub async fn fan_out(
        &self,
        request: CompletionRequest,
        service_ids: &[String],
        strategy: AggregationStrategy,
    ) -> Result<FanOutResult, FanOutError> {
        if service_ids.is_empty() {
            return Err(FanOutError::NoServicesRequested);
        }

        let providers: Vec<(String, Option<Arc<P>>)> = {
            let services = self.services.read().await;
            service_ids
                .iter()
                .map(|id| (id.clone(), services.get(id).cloned()))
                .collect()
        };

        let calls = providers.into_iter().map(|(id, provider)| {
            let request = request.clone();
            async move {
                match provider {
                    Some(provider) => (id, provider.complete(request).await.ok()),
                    None => (id, None),
                }
            }
        });
        let responses: Vec<ServiceOutcome> = futures_util::future::join_all(calls).await;

        Ok(Self::aggregate(strategy, responses))
    }

    fn aggregate(strategy: AggregationStrategy, responses: Vec<ServiceOutcome>) -> FanOutResult {
        let successes: Vec<&CompletionResponse> =
            responses.iter().filter_map(|(_, r)| r.as_ref()).collect();
        if successes.is_empty() {
            return FanOutResult::empty(responses);
        }

        match strategy {
            AggregationStrategy::First => {
                let winner = successes[0];
                FanOutResult { text: winner.text.clone(), metadata: winner.metadata.clone(), responses }
            }
            AggregationStrategy::Shortest => {
                let winner = pick_by(&successes, |r| r.text.len(), std::cmp::Ordering::Less);
                FanOutResult { text: winner.text.clone(), metadata: winner.metadata.clone(), responses }
            }
            AggregationStrategy::Longest => {
                let winner = pick_by(&successes, |r| r.text.len(), std::cmp::Ordering::Greater);
                FanOutResult { text: winner.text.clone(), metadata: winner.metadata.clone(), responses }
            }
            AggregationStrategy::Confidence => {
                let winner = pick_by_f64(&successes, confidence_of);
                FanOutResult { text: winner.text.clone(), metadata: winner.metadata.clone(), responses }
            }
            AggregationStrategy::Merge => {
                let text = successes.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("\n---\n");
                let mut metadata = HashMap::new();
                for r in &successes {
                    metadata.extend(r.metadata.clone());
                }
                FanOutResult { text, metadata, responses }
            }
        }
    }
}

fn confidence_of(response: &CompletionResponse) -> f64 {
    response.metadata.get("confidence").and_then(MetadataValue::as_f64).unwrap_or(0.0)
}

/// Picks the first element whose key improves on the running best in
/// `direction` (`Less` for a minimum, `Greater` for a maximum), so ties keep
/// the earliest entry rather than the last.
fn pick_by<'a, T, K: Ord>(
    items: &[&'a T],
    key: impl Fn(&T) -> K,
    direction: std::cmp::Ordering,
) -> &'a T {
    let mut best = items[0];
    let mut best_key = key(best);
    for item in &items[1..] {
        let k = key(item);
        if k.cmp(&best_key) == direction {
            best = item;
            best_key = k;
        }
    }
    best
}

fn pick_by_f64<'a, T>(items: &[&'a T], key: impl Fn(&T) -> f64) -> &'a T {
    let mut best = items[0];
    let mut best_key = key(best);
    for item in &items[1..] {
        let k = key(item);
        if k > best_key {
            best = item;
            best_key = k;
        }
    }
    best
}
