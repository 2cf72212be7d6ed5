//! Per-client capability discovery, live updates, and an event stream (C13).


use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::warn;

use crate::provider::McpClient;
use crate::value::MetadataValue;

/// Protocol versions this manager accepts in [`CapabilityManager::update_capabilities`].
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-03-26"];

/// One named capability and whether it is currently enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    /// Capability name (`"tools"`, `"prompts"`, `"resources"`, `"protocol_versioning"`, ...).
    pub name: String,
    /// Whether the capability is currently active.
    pub enabled: bool,
    /// Free-form configuration (e.g. `tool_count`, `supported_versions`).
    pub configuration: HashMap<String, MetadataValue>,
}

/// A client's full set of discovered/configured capabilities, by name.
pub type CapabilitySet = HashMap<String, Capability>;

/// The kind of change a [`CapabilityEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityEventType {
    /// A capability transitioned to enabled.
    Enabled,
    /// A capability transitioned to disabled.
    Disabled,
    /// A capability's configuration changed without a state transition.
    Updated,
}

/// Emitted on every capability state or configuration change.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityEvent {
    /// What kind of change occurred.
    pub event_type: CapabilityEventType,
    /// The client the change applies to.
    pub client_id: String,
    /// The capability name affected.
    pub capability_name: String,
    /// A snapshot of the capability's configuration after the change.
    pub data: HashMap<String, MetadataValue>,
    /// Seconds since epoch.
    pub timestamp: i64,
}

/// A request to update one client's declared capabilities.
#[derive(Debug, Clone)]
pub struct CapabilityUpdateRequest {
    /// Target client id.
    pub client_id: String,
    /// Protocol version the client negotiated.
    pub version: String,
    /// Requested batch size ceiling, validated to `[1, 100]`.
    pub max_batch_size: u32,
    /// Configuration patches keyed by capability name.
    pub capabilities: HashMap<String, HashMap<String, MetadataValue>>,
}

/// Errors raised by [`CapabilityManager`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The client id has no registered capability set.
    #[error("unknown client: {0}")]
    UnknownClient(String),
    /// `version` was not in [`SUPPORTED_VERSIONS`].
    #[error("Unsupported capability version")]
    UnsupportedVersion,
    /// `max_batch_size` fell outside `[1, 100]`.
    #[error("Invalid max_batch_size")]
    InvalidMaxBatchSize,
}

/// Counts surfaced by [`CapabilityManager::get_capability_statistics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityStatistics {
    /// Number of clients holding each named capability.
    pub by_name: HashMap<String, usize>,
    /// Total enabled capability instances across all clients.
    pub enabled_count: usize,
    /// Total disabled capability instances across all clients.
    pub disabled_count: usize,
}

struct UpdateRecord {
    #[allow(dead_code)]
    client_id: String,
    #[allow(dead_code)]
    version: String,
    #[allow(dead_code)]
    max_batch_size: u32,
    #[allow(dead_code)]
    timestamp: i64,
}

/// Discovers, tracks, and live-updates per-client MCP capabilities, emitting
/// an event on every change.
pub struct CapabilityManager<C: McpClient> {
    clients: RwLock<HashMap<String, Arc<C>>>,
    capabilities: RwLock<HashMap<String, CapabilitySet>>,
    update_history: RwLock<Vec<UpdateRecord>>,
    events: broadcast::Sender<CapabilityEvent>,
    request_seq: AtomicU64,
}

impl<C: McpClient + 'static> CapabilityManager<C> {
    /// Creates a manager whose event stream buffers up to `event_capacity`
    /// unread events before lagging receivers drop the oldest.
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            clients: RwLock::new(HashMap::new()),
            capabilities: RwLock::new(HashMap::new()),
            update_history: RwLock::new(Vec::new()),
            events,
            request_seq: AtomicU64::new(0),
        }
    }

    /// Subscribes to the capability event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CapabilityEvent> {
        self.events.subscribe()
    }

    /// Registers `client_id`, probing `list_tools`/`list_prompts`/`list_resources`
    /// concurrently (a per-listing failure is non-fatal) and recording a
    /// `tools`/`prompts`/`resources` capability plus a synthetic
    /// `protocol_versioning` capability. Emits an `Enabled` event per
    /// discovered capability.
    pub async fn register_client(&self, client_id: impl Into<String>, client: Arc<C>) {
        let client_id = client_id.into();
        self.clients.write().await.insert(client_id.clone(), Arc::clone(&client));
        self.discover(&client_id, &client).await;
    }

    /// Unregisters `client_id`, discarding its capability set.
    pub async fn unregister_client(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
        self.capabilities.write().await.remove(client_id);
    }

    async fn discover(&self, client_id: &str, client: &C) {
        let (tools, prompts, resources) =
            tokio::join!(client.list_tools(), client.list_prompts(), client.list_resources());

        let mut set = CapabilitySet::new();
        set.insert("tools".to_string(), listing_capability(client_id, "tools", "tool_count", tools));
        set.insert("prompts".to_string(), listing_capability(client_id, "prompts", "prompt_count", prompts));
        set.insert(
            "resources".to_string(),
            listing_capability(client_id, "resources", "resource_count", resources),
        );
        set.insert(
            "protocol_versioning".to_string(),
            Capability {
                name: "protocol_versioning".to_string(),
                enabled: true,
                configuration: HashMap::from([(
                    "supported_versions".to_string(),
                    MetadataValue::List(
                        SUPPORTED_VERSIONS.iter().map(|v| MetadataValue::String(v.to_string())).collect(),
                    ),
                )]),
            },
        );

        for capability in set.values() {
            self.emit(CapabilityEventType::Enabled, client_id, capability);
        }
        self.capabilities.write().await.insert(client_id.to_string(), set);
    }

    /// Re-probes every registered client's capabilities, emitting `Updated`
    /// events for the refreshed set.
    pub async fn refresh_all_capabilities(&self) {
        let clients: Vec<(String, Arc<C>)> =
            self.clients.read().await.iter().map(|(id, c)| (id.clone(), Arc::clone(c))).collect();
        for (client_id, client) in clients {
            let (tools, prompts, resources) =
                tokio::join!(client.list_tools(), client.list_prompts(), client.list_resources());
            let mut set = CapabilitySet::new();
            set.insert("tools".to_string(), listing_capability(&client_id, "tools", "tool_count", tools));
            set.insert("prompts".to_string(), listing_capability(&client_id, "prompts", "prompt_count", prompts));
            set.insert(
                "resources".to_string(),
                listing_capability(&client_id, "resources", "resource_count", resources),
            );
            set.insert(
                "protocol_versioning".to_string(),
                Capability {
                    name: "protocol_versioning".to_string(),
                    enabled: true,
                    configuration: HashMap::from([(
                        "supported_versions".to_string(),
                        MetadataValue::List(
                            SUPPORTED_VERSIONS.iter().map(|v| MetadataValue::String(v.to_string())).collect(),
                        ),
                    )]),
                },
            );
            for capability in set.values() {
                self.emit(CapabilityEventType::Updated, &client_id, capability);
            }
            self.capabilities.write().await.insert(client_id, set);
        }
    }

    /// Validates and applies `request`, merging each patch into the
    /// client's existing capability configuration and appending to the
    /// update history. Emits an `Updated` event per touched capability.
    pub async fn update_capabilities(&self, request: CapabilityUpdateRequest) -> Result<(), CapabilityError> {
        if !SUPPORTED_VERSIONS.contains(&request.version.as_str()) {
            return Err(CapabilityError::UnsupportedVersion);
        }
        if !(1..=100).contains(&request.max_batch_size) {
            return Err(CapabilityError::InvalidMaxBatchSize);
        }

        let mut capabilities = self.capabilities.write().await;
        let set = capabilities
            .get_mut(&request.client_id)
            .ok_or_else(|| CapabilityError::UnknownClient(request.client_id.clone()))?;

        for (name, patch) in &request.capabilities {
            let entry = set.entry(name.clone()).or_insert_with(|| Capability {
                name: name.clone(),
                enabled: true,
                configuration: HashMap::new(),
            });
            entry.configuration.extend(patch.clone());
            self.emit(CapabilityEventType::Updated, &request.client_id, entry);
        }
        drop(capabilities);

        self.update_history.write().await.push(UpdateRecord {
            client_id: request.client_id,
            version: request.version,
            max_batch_size: request.max_batch_size,
            timestamp: now(),
        });
        Ok(())
    }

    /// Enables `capability_name` for `client_id`, emitting `Enabled` if it
    /// changed state.
    pub async fn enable_capability(&self, client_id: &str, capability_name: &str) -> Result<(), CapabilityError> {
        self.set_enabled(client_id, capability_name, true).await
    }

    /// Disables `capability_name` for `client_id`, emitting `Disabled` if it
    /// changed state.
    pub async fn disable_capability(&self, client_id: &str, capability_name: &str) -> Result<(), CapabilityError> {
        self.set_enabled(client_id, capability_name, false).await
    }

    async fn set_enabled(&self, client_id: &str, capability_name: &str, enabled: bool) -> Result<(), CapabilityError> {
        let mut capabilities = self.capabilities.write().await;
        let set = capabilities
            .get_mut(client_id)
            .ok_or_else(|| CapabilityError::UnknownClient(client_id.to_string()))?;
        let capability = set
            .get_mut(capability_name)
            .ok_or_else(|| CapabilityError::UnknownClient(format!("{client_id}/{capability_name}")))?;

        if capability.enabled != enabled {
            capability.enabled = enabled;
            let event_type = if enabled { CapabilityEventType::Enabled } else { CapabilityEventType::Disabled };
            let data = capability.configuration.clone();
            drop(capabilities);
            let _ = self.events.send(CapabilityEvent {
                event_type,
                client_id: client_id.to_string(),
                capability_name: capability_name.to_string(),
                data,
                timestamp: now(),
            });
        }
        Ok(())
    }

    /// Returns `client_id`'s full capability set, if registered.
    pub async fn get_all_capabilities(&self, client_id: &str) -> Option<CapabilitySet> {
        self.capabilities.read().await.get(client_id).cloned()
    }

    /// Aggregates capability counts across every registered client.
    pub async fn get_capability_statistics(&self) -> CapabilityStatistics {
        let capabilities = self.capabilities.read().await;
        let mut stats = CapabilityStatistics::default();
        for set in capabilities.values() {
            for capability in set.values() {
                *stats.by_name.entry(capability.name.clone()).or_insert(0) += 1;
                if capability.enabled {
                    stats.enabled_count += 1;
                } else {
                    stats.disabled_count += 1;
                }
            }
        }
        stats
    }

    /// Generates a monotonically increasing request id, `"cap_<n>"`.
    pub fn generate_request_id(&self) -> String {
        format!("cap_{}", self.request_seq.fetch_add(1, Ordering::SeqCst))
    }

    fn emit(&self, event_type: CapabilityEventType, client_id: &str, capability: &Capability) {
        let _ = self.events.send(CapabilityEvent {
            event_type,
            client_id: client_id.to_string(),
            capability_name: capability.name.clone(),
            data: capability.configuration.clone(),
            timestamp: now(),
        });
    }
}

fn listing_capability(
    client_id: &str,
    name: &str,
    count_key: &str,
    result: Result<Vec<crate::provider::McpEntry>, crate::provider::McpError>,
) -> Capability {
    match result {
        Ok(entries) => Capability {
            name: name.to_string(),
            enabled: true,
            configuration: HashMap::from([(count_key.to_string(), MetadataValue::Int(entries.len() as i64))]),
        },
        Err(err) => {
            warn!(client_id, capability = name, error = %err, "capability probe failed");
            Capability {
                name: name.to_string(),
                enabled: false,
                configuration: HashMap::from([("error".to_string(), MetadataValue::String(err.to_string()))]),
            }
        }
    }
}

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
