//! Environment configuration.
//!
//! [`Config`] aggregates the option groups recognized by each component
//! (§6): retrieval cache, batching, health checks, auth, circuit breaker,
//! and the chunker. Each group follows the same `from_env`/`ENV_*` pattern.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration, aggregating every component's option group.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to a local embedding model, if one is configured. Informational
    /// only today; see [`crate::embedding::SinterConfig::model_path`].
    pub model_path: Option<PathBuf>,
    /// Endpoint of an optional remote Qdrant vector store backend.
    pub qdrant_url: String,

    /// Retrieval result-cache options.
    pub retrieval_cache: RetrievalCacheConfig,
    /// Batch request manager options.
    pub batch: BatchConfig,
    /// Health monitor options.
    pub health_check: HealthCheckConfig,
    /// MCP auth adapter options.
    pub auth: AuthConfig,
    /// Circuit breaker options.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Document chunker options.
    pub chunker: ChunkerConfig,
}

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: None,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            retrieval_cache: RetrievalCacheConfig::default(),
            batch: BatchConfig::default(),
            health_check: HealthCheckConfig::default(),
            auth: AuthConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            chunker: ChunkerConfig::default(),
        }
    }
}

impl Config {
    const ENV_MODEL_PATH: &'static str = "REFLEX_MODEL_PATH";
    const ENV_QDRANT_URL: &'static str = "REFLEX_QDRANT_URL";

    /// Builds a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            model_path: parse_optional_path_from_env(Self::ENV_MODEL_PATH),
            qdrant_url: parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            retrieval_cache: RetrievalCacheConfig::from_env()?,
            batch: BatchConfig::from_env()?,
            health_check: HealthCheckConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            circuit_breaker: CircuitBreakerConfig::from_env()?,
            chunker: ChunkerConfig::from_env()?,
        })
    }

    /// Validates filesystem-dependent options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref path) = self.model_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        self.chunker.validate()?;

        Ok(())
    }
}

fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_string_from_env(var_name: &str, default: String) -> String {
    env::var(var_name).unwrap_or(default)
}

fn parse_u64_from_env(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|source| ConfigError::IntParseError {
                name,
                value,
                source,
            }),
        Err(_) => Ok(default),
    }
}

fn parse_usize_from_env(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    Ok(parse_u64_from_env(name, default as u64)? as usize)
}

fn parse_millis_from_env(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_millis(parse_u64_from_env(name, default_ms)?))
}

fn parse_bool_from_env(name: &'static str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Options for the retrieval manager's LRU result cache (C6).
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCacheConfig {
    /// Maximum number of cached query results.
    pub max_size: u64,
}

impl Default for RetrievalCacheConfig {
    fn default() -> Self {
        Self { max_size: 1_000 }
    }
}

impl RetrievalCacheConfig {
    const ENV_MAX_SIZE: &'static str = "REFLEX_RETRIEVAL_CACHE_MAX_SIZE";

    /// Builds from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_size: parse_u64_from_env(Self::ENV_MAX_SIZE, defaults.max_size)?,
        })
    }
}

/// Options for the batch request manager (C9).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Maximum batch size before an immediate flush.
    pub max_batch_size: usize,
    /// Time a batch waits before flushing.
    pub batch_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Whether response ordering must match submission ordering.
    pub preserve_order: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 20,
            batch_timeout: Duration::from_millis(50),
            request_timeout: Duration::from_secs(30),
            preserve_order: true,
        }
    }
}

impl BatchConfig {
    const ENV_MAX_BATCH_SIZE: &'static str = "REFLEX_BATCH_MAX_SIZE";
    const ENV_BATCH_TIMEOUT_MS: &'static str = "REFLEX_BATCH_TIMEOUT_MS";
    const ENV_REQUEST_TIMEOUT_MS: &'static str = "REFLEX_BATCH_REQUEST_TIMEOUT_MS";
    const ENV_PRESERVE_ORDER: &'static str = "REFLEX_BATCH_PRESERVE_ORDER";

    /// Builds from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_batch_size: parse_usize_from_env(
                Self::ENV_MAX_BATCH_SIZE,
                defaults.max_batch_size,
            )?,
            batch_timeout: parse_millis_from_env(
                Self::ENV_BATCH_TIMEOUT_MS,
                defaults.batch_timeout.as_millis() as u64,
            )?,
            request_timeout: parse_millis_from_env(
                Self::ENV_REQUEST_TIMEOUT_MS,
                defaults.request_timeout.as_millis() as u64,
            )?,
            preserve_order: parse_bool_from_env(
                Self::ENV_PRESERVE_ORDER,
                defaults.preserve_order,
            ),
        })
    }
}

/// Options for the health monitor (C14).
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckConfig {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Additional retry attempts after the first failure.
    pub max_retries: u32,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
    /// Whether to include the synthetic system pseudo-component.
    pub include_system_metrics: bool,
    /// Client ids excluded from health checks.
    pub exclude_components: Vec<String>,
    /// Whether to probe authentication status as part of the check.
    pub check_authentication: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            include_system_metrics: true,
            exclude_components: Vec::new(),
            check_authentication: false,
        }
    }
}

impl HealthCheckConfig {
    const ENV_TIMEOUT_MS: &'static str = "REFLEX_HEALTH_TIMEOUT_MS";
    const ENV_MAX_RETRIES: &'static str = "REFLEX_HEALTH_MAX_RETRIES";
    const ENV_RETRY_DELAY_MS: &'static str = "REFLEX_HEALTH_RETRY_DELAY_MS";
    const ENV_INCLUDE_SYSTEM_METRICS: &'static str = "REFLEX_HEALTH_INCLUDE_SYSTEM_METRICS";
    const ENV_EXCLUDE_COMPONENTS: &'static str = "REFLEX_HEALTH_EXCLUDE_COMPONENTS";
    const ENV_CHECK_AUTHENTICATION: &'static str = "REFLEX_HEALTH_CHECK_AUTHENTICATION";

    /// Builds from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let exclude_components = env::var(Self::ENV_EXCLUDE_COMPONENTS)
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.exclude_components);

        Ok(Self {
            timeout: parse_millis_from_env(
                Self::ENV_TIMEOUT_MS,
                defaults.timeout.as_millis() as u64,
            )?,
            max_retries: parse_u64_from_env(Self::ENV_MAX_RETRIES, defaults.max_retries as u64)?
                as u32,
            retry_delay: parse_millis_from_env(
                Self::ENV_RETRY_DELAY_MS,
                defaults.retry_delay.as_millis() as u64,
            )?,
            include_system_metrics: parse_bool_from_env(
                Self::ENV_INCLUDE_SYSTEM_METRICS,
                defaults.include_system_metrics,
            ),
            exclude_components,
            check_authentication: parse_bool_from_env(
                Self::ENV_CHECK_AUTHENTICATION,
                defaults.check_authentication,
            ),
        })
    }
}

/// Options for the MCP auth adapter (C12).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    /// Scopes required for successful authentication.
    pub scopes: Vec<String>,
    /// Whether to schedule automatic token refresh.
    pub auto_refresh: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            auto_refresh: true,
        }
    }
}

impl AuthConfig {
    const ENV_SCOPES: &'static str = "REFLEX_AUTH_SCOPES";
    const ENV_AUTO_REFRESH: &'static str = "REFLEX_AUTH_AUTO_REFRESH";

    /// Builds from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let scopes = env::var(Self::ENV_SCOPES)
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.scopes);

        Ok(Self {
            scopes,
            auto_refresh: parse_bool_from_env(Self::ENV_AUTO_REFRESH, defaults.auto_refresh),
        })
    }
}

/// Options for the circuit breaker (C7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to trip from closed to open.
    pub failure_threshold: u32,
    /// Time open before transitioning to half-open.
    pub reset_timeout: Duration,
    /// Time a half-open trial window stays open before reverting.
    pub half_open_timeout: Duration,
    /// Consecutive successes required to close from half-open.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_timeout: Duration::from_secs(10),
            half_open_success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    const ENV_FAILURE_THRESHOLD: &'static str = "REFLEX_CIRCUIT_FAILURE_THRESHOLD";
    const ENV_RESET_TIMEOUT_MS: &'static str = "REFLEX_CIRCUIT_RESET_TIMEOUT_MS";
    const ENV_HALF_OPEN_TIMEOUT_MS: &'static str = "REFLEX_CIRCUIT_HALF_OPEN_TIMEOUT_MS";
    const ENV_HALF_OPEN_SUCCESS_THRESHOLD: &'static str =
        "REFLEX_CIRCUIT_HALF_OPEN_SUCCESS_THRESHOLD";

    /// Builds from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            failure_threshold: parse_u64_from_env(
                Self::ENV_FAILURE_THRESHOLD,
                defaults.failure_threshold as u64,
            )? as u32,
            reset_timeout: parse_millis_from_env(
                Self::ENV_RESET_TIMEOUT_MS,
                defaults.reset_timeout.as_millis() as u64,
            )?,
            half_open_timeout: parse_millis_from_env(
                Self::ENV_HALF_OPEN_TIMEOUT_MS,
                defaults.half_open_timeout.as_millis() as u64,
            )?,
            half_open_success_threshold: parse_u64_from_env(
                Self::ENV_HALF_OPEN_SUCCESS_THRESHOLD,
                defaults.half_open_success_threshold as u64,
            )? as u32,
        })
    }
}

/// Options for the document chunker (C3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkerConfig {
    /// Default chunk size (in characters, before language adjustment).
    pub default_chunk_size: usize,
    /// Default overlap (in characters, before language adjustment).
    pub default_chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: 1000,
            default_chunk_overlap: 200,
        }
    }
}

impl ChunkerConfig {
    const ENV_DEFAULT_CHUNK_SIZE: &'static str = "REFLEX_CHUNKER_DEFAULT_SIZE";
    const ENV_DEFAULT_CHUNK_OVERLAP: &'static str = "REFLEX_CHUNKER_DEFAULT_OVERLAP";

    /// Builds from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            default_chunk_size: parse_usize_from_env(
                Self::ENV_DEFAULT_CHUNK_SIZE,
                defaults.default_chunk_size,
            )?,
            default_chunk_overlap: parse_usize_from_env(
                Self::ENV_DEFAULT_CHUNK_OVERLAP,
                defaults.default_chunk_overlap,
            )?,
        })
    }

    /// Validates that `overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_chunk_overlap >= self.default_chunk_size {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_DEFAULT_CHUNK_OVERLAP,
                value: self.default_chunk_overlap as i64,
                min: 0,
                max: self.default_chunk_size as i64 - 1,
            });
        }
        Ok(())
    }
}
