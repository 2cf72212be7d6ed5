//! Per-client health probing with retries, history, and a system rollup (C14).

#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::warn;

use crate::config::HealthCheckConfig;
use crate::provider::McpClient;

/// Bounds each client's rolling health history.
const HISTORY_LIMIT: usize = 100;

/// Name of the synthetic aggregate component.
pub const SYSTEM_COMPONENT: &str = "system";

/// Worst-to-best: `Unhealthy > Degraded > Healthy > Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// No recent check, or the component was excluded.
    Unknown,
    /// Responding within expectations.
    Healthy,
    /// Responding, but with elevated latency or partial failures.
    Degraded,
    /// Every attempt failed.
    Unhealthy,
}

impl HealthStatus {
    fn severity(self) -> u8 {
        match self {
            HealthStatus::Unknown => 0,
            HealthStatus::Healthy => 1,
            HealthStatus::Degraded => 2,
            HealthStatus::Unhealthy => 3,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.severity() > self.severity() { other } else { self }
    }
}

/// The outcome of one health probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceHealth {
    /// Overall status for this component.
    pub status: HealthStatus,
    /// Wall-clock time the last successful attempt took, if any attempt ran.
    pub response_time_ms: Option<u64>,
    /// Tool/prompt/resource counts observed during the check.
    pub capability_summary: HashMap<String, usize>,
    /// Present iff `status` is `Unhealthy` or `Unknown`.
    pub error: Option<String>,
}

impl ServiceHealth {
    fn unknown(reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unknown,
            response_time_ms: None,
            capability_summary: HashMap::new(),
            error: Some(reason.into()),
        }
    }
}

/// A full health check's results.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    /// Overall status: the worst of every included component.
    pub overall: HealthStatus,
    /// Per-component results, including `system` if requested.
    pub components: HashMap<String, ServiceHealth>,
}

/// Probes registered MCP clients for liveness, with bounded retries and a
/// rolling per-client history.
pub struct HealthMonitor<C: McpClient> {
    clients: RwLock<HashMap<String, Arc<C>>>,
    config: HealthCheckConfig,
    history: RwLock<HashMap<String, VecDeque<ServiceHealth>>>,
    started_at: Instant,
}

impl<C: McpClient + 'static> HealthMonitor<C> {
    /// Creates a monitor with the given config.
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            config,
            history: RwLock::new(HashMap::new()),
            started_at: Instant::now(),
        }
    }

    /// Registers a client to be health-checked under `client_id`.
    pub async fn register_client(&self, client_id: impl Into<String>, client: Arc<C>) {
        self.clients.write().await.insert(client_id.into(), client);
    }

    /// Unregisters a client, clearing its history.
    pub async fn unregister_client(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
        self.history.write().await.remove(client_id);
    }

    /// Checks `client_ids` (or every registered client if `None`), each up
    /// to `1 + max_retries` attempts, and optionally rolls up a `system`
    /// pseudo-component. Excluded components resolve to [`HealthStatus::Unknown`].
    pub async fn perform_health_check(
        &self,
        client_ids: Option<&[String]>,
        include_system_metrics: Option<bool>,
    ) -> HealthReport {
        let registered: Vec<String> = self.clients.read().await.keys().cloned().collect();
        let targets: Vec<String> = match client_ids {
            Some(ids) => ids.to_vec(),
            None => registered.clone(),
        };

        let mut components = HashMap::new();
        for client_id in &targets {
            let result = if self.config.exclude_components.iter().any(|x| x == client_id) {
                ServiceHealth::unknown("excluded from health checks")
            } else {
                let client = self.clients.read().await.get(client_id).cloned();
                match client {
                    Some(client) => self.check_one(client_id, &client).await,
                    None => ServiceHealth::unknown(format!("client {client_id} is not registered")),
                }
            };
            self.record(client_id, result.clone()).await;
            components.insert(client_id.clone(), result);
        }

        let include_system = include_system_metrics.unwrap_or(self.config.include_system_metrics);
        if include_system {
            components.insert(SYSTEM_COMPONENT.to_string(), self.system_component(&components, registered.len()).await);
        }

        let overall = components.values().fold(HealthStatus::Unknown, |acc, h| acc.worst(h.status));
        HealthReport { overall, components }
    }

    async fn check_one(&self, client_id: &str, client: &C) -> ServiceHealth {
        let attempts = 1 + self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }

            let start = Instant::now();
            let probe = tokio::time::timeout(self.config.timeout, async {
                let (tools, prompts, resources) =
                    tokio::join!(client.list_tools(), client.list_prompts(), client.list_resources());
                (tools, prompts, resources)
            })
            .await;

            match probe {
                Ok((Ok(tools), prompts, resources)) => {
                    let elapsed = start.elapsed();
                    let mut summary = HashMap::new();
                    summary.insert("tool_count".to_string(), tools.len());
                    if let Ok(prompts) = &prompts {
                        summary.insert("prompt_count".to_string(), prompts.len());
                    }
                    if let Ok(resources) = &resources {
                        summary.insert("resource_count".to_string(), resources.len());
                    }
                    if self.config.check_authentication {
                        summary.insert("supports_authentication".to_string(), client.supports_authentication() as usize);
                    }

                    let degraded = prompts.is_err() || resources.is_err();
                    return ServiceHealth {
                        status: if degraded { HealthStatus::Degraded } else { HealthStatus::Healthy },
                        response_time_ms: Some(elapsed.as_millis() as u64),
                        capability_summary: summary,
                        error: None,
                    };
                }
                Ok((Err(err), _, _)) => {
                    last_error = Some(err.to_string());
                }
                Err(_) => {
                    last_error = Some(format!("timed out after {:?}", self.config.timeout));
                }
            }
        }

        let error = last_error.unwrap_or_else(|| "health check failed".to_string());
        warn!(client_id, error = %error, "health check exhausted retries");
        ServiceHealth {
            status: HealthStatus::Unhealthy,
            response_time_ms: None,
            capability_summary: HashMap::new(),
            error: Some(error),
        }
    }

    async fn system_component(&self, components: &HashMap<String, ServiceHealth>, registered_count: usize) -> ServiceHealth {
        let healthy_clients =
            components.values().filter(|h| matches!(h.status, HealthStatus::Healthy | HealthStatus::Degraded)).count();

        let mut summary = HashMap::new();
        summary.insert("registered_clients".to_string(), registered_count);
        summary.insert("healthy_clients".to_string(), healthy_clients);
        summary.insert("memory_usage_kb".to_string(), resident_memory_kb());
        summary.insert("uptime_secs".to_string(), self.started_at.elapsed().as_secs() as usize);

        ServiceHealth {
            status: HealthStatus::Healthy,
            response_time_ms: None,
            capability_summary: summary,
            error: None,
        }
    }

    async fn record(&self, client_id: &str, result: ServiceHealth) {
        let mut history = self.history.write().await;
        let entries = history.entry(client_id.to_string()).or_default();
        entries.push_back(result);
        while entries.len() > HISTORY_LIMIT {
            entries.pop_front();
        }
    }

    /// Returns `client_id`'s rolling health history, oldest first.
    pub async fn get_history(&self, client_id: &str) -> Vec<ServiceHealth> {
        self.history.read().await.get(client_id).map(|h| h.iter().cloned().collect()).unwrap_or_default()
    }
}

/// Process resident set size in KB, read from `/proc/self/statm`. Returns 0
/// where that isn't available (non-Linux).
#[cfg(target_os = "linux")]
fn resident_memory_kb() -> usize {
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|contents| contents.split_whitespace().nth(1).map(str::to_string))
        .and_then(|pages| pages.parse::<usize>().ok())
        .map(|pages| pages * 4096 / 1024)
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_kb() -> usize {
    0
}
