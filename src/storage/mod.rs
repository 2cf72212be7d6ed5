//! Storage interface (consumed, spec §6).
//!
//! Persistence is a consumed contract, not a feature this crate ships a
//! backend for: callers that need durable storage implement [`Storage`]
//! against whatever they already use (a KV store, a filesystem, object
//! storage). [`mock::MockStorage`] is the in-memory implementation used by
//! this crate's own tests.

pub mod error;
pub mod mock;

pub use error::StorageError;
pub use mock::MockStorage;

use serde::{Serialize, de::DeserializeOwned};

/// A single turn in a session's message history.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredMessage {
    /// e.g. "user", "assistant", "system".
    pub role: String,
    /// Message text.
    pub content: String,
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
}

impl StoredMessage {
    /// Creates a new message with the given role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp_ms,
        }
    }
}

/// Key-value persistence with session-scoped message history.
///
/// All methods are async (RPITIT) so implementations can back onto a real
/// network store without forcing `#[async_trait]` boxing on callers that
/// don't need it.
pub trait Storage: Send + Sync {
    /// Prepares the backend for use (opening connections, running
    /// migrations, etc). Called once before other methods.
    fn initialize(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Saves a raw UTF-8 string under `key`.
    fn save_string(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Loads a string previously saved with [`Storage::save_string`].
    fn load_string(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Saves a serializable value as JSON under `key`.
    fn save_object<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        async move {
            let json = serde_json::to_string(value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            self.save_string(key, &json).await
        }
    }

    /// Loads and deserializes a value previously saved with
    /// [`Storage::save_object`].
    fn load_object<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>, StorageError>> + Send {
        async move {
            match self.load_string(key).await? {
                Some(json) => serde_json::from_str(&json)
                    .map(Some)
                    .map_err(|e| StorageError::Serialization(e.to_string())),
                None => Ok(None),
            }
        }
    }

    /// Saves raw bytes under `key`.
    fn save_data(
        &self,
        key: &str,
        value: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Loads raw bytes previously saved with [`Storage::save_data`].
    fn load_data(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// Deletes the value at `key`, if any. Not an error if absent.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Returns whether `key` currently has a stored value.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Lists keys, optionally restricted to those starting with `prefix`.
    fn list_keys(
        &self,
        prefix: Option<&str>,
    ) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// Deletes every key. Use with care; mainly intended for tests.
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Appends a message to a session's history.
    fn store_message(
        &self,
        session_id: &str,
        message: StoredMessage,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Returns a session's message history in append order.
    fn retrieve_history(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, StorageError>> + Send;

    /// Deletes a session's entire message history.
    fn delete_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
