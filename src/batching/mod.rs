//! JSON-RPC 2.0 batch request manager (C9).
//!
//! Requests are queued per `client_id` and flushed either immediately
//! (`force_immediate` or the queue reaching `max_batch_size`) or after a
//! debounced `batch_timeout` (spec §4.9). A flush serializes the queue as a
//! single JSON-RPC batch, dispatches it through the client's `execute_batch`
//! entry point, and demultiplexes responses back to each caller's future by
//! request id.


use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::BatchConfig;
use crate::provider::McpClient;

/// A single request in a JSON-RPC 2.0 batch (spec §6 wire form).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Request id, assigned in submission order.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

/// A JSON-RPC error object, as carried by [`JsonRpcResponse::error`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
}

/// A single response in a batch, matched back to its request by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Request id this response answers.
    pub id: u64,
    /// The successful result, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error, if the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

/// Errors raised by the batch request manager itself (as opposed to a
/// successful JSON-RPC response carrying an `error` object, which is
/// surfaced as [`BatchRequestManagerError::Remote`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BatchRequestManagerError {
    /// `client_id` was never registered.
    #[error("unknown client: {0}")]
    UnknownClient(String),
    /// `execute_batch` itself failed (transport-level).
    #[error("batch transport failed: {0}")]
    Transport(String),
    /// The client returned a JSON-RPC error object for this request.
    #[error("remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// The batch response didn't include an entry for this request's id.
    #[error("no response for request id {0}")]
    MissingResponse(u64),
}

struct BatchEntry {
    id: u64,
    method: String,
    params: Value,
    completer: oneshot::Sender<Result<Value, BatchRequestManagerError>>,
}

#[derive(Default)]
struct ClientQueue {
    entries: Vec<BatchEntry>,
    timer: Option<JoinHandle<()>>,
}

/// Point-in-time counters for observability (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchStatistics {
    /// Total requests submitted via [`BatchRequestManager::add_request`].
    pub total_requests: u64,
    /// Total batches actually flushed.
    pub total_batches: u64,
    /// Number of distinct clients with at least one registered queue.
    pub registered_clients: usize,
    /// Requests currently queued, not yet flushed.
    pub pending_requests: usize,
    /// `(total_requests - total_batches) / total_requests`: the fraction of
    /// requests that avoided their own round trip by riding in a batch with
    /// others. `0.0` with no requests submitted yet.
    pub batch_efficiency: f64,
}

/// Batches JSON-RPC requests per client by time or size, per spec §4.9.
pub struct BatchRequestManager<C: McpClient> {
    clients: RwLock<HashMap<String, Arc<C>>>,
    queues: Mutex<HashMap<String, ClientQueue>>,
    config: BatchConfig,
    total_requests: AtomicU64,
    total_batches: AtomicU64,
    sequence: AtomicU64,
}

impl<C: McpClient + 'static> BatchRequestManager<C> {
    /// Creates a manager with no registered clients.
    pub fn new(config: BatchConfig) -> Arc<Self> {
        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            config,
            total_requests: AtomicU64::new(0),
            total_batches: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
        })
    }

    /// Registers `client` under `client_id`, the batch entry point future
    /// calls will route to.
    pub async fn register_client(&self, client_id: impl Into<String>, client: Arc<C>) {
        self.clients.write().await.insert(client_id.into(), client);
    }

    /// Queues `method`/`params` for `client_id`, returning a future that
    /// resolves once the containing batch's response arrives.
    ///
    /// Flushes immediately if `force_immediate` or the queue has reached
    /// `max_batch_size`; otherwise (re)arms a debounced timer for
    /// `batch_timeout`, replacing any timer already armed for this client.
    pub async fn add_request(
        self: &Arc<Self>,
        method: impl Into<String>,
        params: Value,
        client_id: &str,
        force_immediate: bool,
    ) -> Result<Value, BatchRequestManagerError> {
        if !self.clients.read().await.contains_key(client_id) {
            return Err(BatchRequestManagerError::UnknownClient(client_id.to_string()));
        }

        let (tx, rx) = oneshot::channel();
        let id = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.total_requests.fetch_add(1, Ordering::SeqCst);

        let entry = BatchEntry {
            id,
            method: method.into(),
            params,
            completer: tx,
        };

        let flush_now = {
            let mut queues = self.queues.lock().await;
            let queue = queues.entry(client_id.to_string()).or_default();
            queue.entries.push(entry);

            let over_size = queue.entries.len() >= self.config.max_batch_size.max(1);
            if let Some(handle) = queue.timer.take() {
                handle.abort();
            }

            if force_immediate || over_size {
                true
            } else {
                let manager = Arc::clone(self);
                let client_id = client_id.to_string();
                let batch_timeout = self.config.batch_timeout;
                queue.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(batch_timeout).await;
                    manager.flush_client(&client_id).await;
                }));
                false
            }
        };

        if flush_now {
            self.flush_client(client_id).await;
        }

        rx.await
            .unwrap_or_else(|_| Err(BatchRequestManagerError::Transport("request dropped before flush".to_string())))
    }

    /// Flushes the pending queue for `client_id`, if any. A no-op for a
    /// client with nothing queued.
    pub async fn flush_client(&self, client_id: &str) {
        let entries = {
            let mut queues = self.queues.lock().await;
            let Some(queue) = queues.get_mut(client_id) else {
                return;
            };
            if let Some(handle) = queue.timer.take() {
                handle.abort();
            }
            std::mem::take(&mut queue.entries)
        };

        if entries.is_empty() {
            return;
        }

        self.total_batches.fetch_add(1, Ordering::SeqCst);

        let client = self.clients.read().await.get(client_id).cloned();
        let Some(client) = client else {
            let error = BatchRequestManagerError::UnknownClient(client_id.to_string());
            for entry in entries {
                let _ = entry.completer.send(Err(error.clone()));
            }
            return;
        };

        let requests: Vec<Value> = entries
            .iter()
            .map(|entry| {
                serde_json::to_value(JsonRpcRequest {
                    jsonrpc: "2.0".to_string(),
                    id: entry.id,
                    method: entry.method.clone(),
                    params: entry.params.clone(),
                })
                .unwrap_or(Value::Null)
            })
            .collect();

        match client.execute_batch(requests).await {
            Ok(raw_responses) => {
                let mut by_id: HashMap<u64, JsonRpcResponse> = raw_responses
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<JsonRpcResponse>(v).ok())
                    .map(|r| (r.id, r))
                    .collect();

                for entry in entries {
                    let result = match by_id.remove(&entry.id) {
                        Some(response) => match response.error {
                            Some(error) => Err(BatchRequestManagerError::Remote {
                                code: error.code,
                                message: error.message,
                            }),
                            None => Ok(response.result.unwrap_or(Value::Null)),
                        },
                        None => Err(BatchRequestManagerError::MissingResponse(entry.id)),
                    };
                    let _ = entry.completer.send(result);
                }
            }
            Err(e) => {
                warn!(client_id, error = %e, "batch transport failed; failing every pending request");
                let error = BatchRequestManagerError::Transport(e.to_string());
                for entry in entries {
                    let _ = entry.completer.send(Err(error.clone()));
                }
            }
        }
    }

    /// Flushes every client's pending queue.
    pub async fn flush(&self) {
        let client_ids: Vec<String> = self.queues.lock().await.keys().cloned().collect();
        for client_id in client_ids {
            self.flush_client(&client_id).await;
        }
    }

    /// Returns a snapshot of the manager's counters.
    pub async fn statistics(&self) -> BatchStatistics {
        let total_requests = self.total_requests.load(Ordering::SeqCst);
        let total_batches = self.total_batches.load(Ordering::SeqCst);
        let registered_clients = self.clients.read().await.len();
        let pending_requests = self.queues.lock().await.values().map(|q| q.entries.len()).sum();

        let batch_efficiency = if total_requests == 0 {
            0.0
        } else {
            (total_requests.saturating_sub(total_batches)) as f64 / total_requests as f64
        };

        BatchStatistics {
            total_requests,
            total_batches,
            registered_clients,
            pending_requests,
            batch_efficiency,
        }
    }
}
