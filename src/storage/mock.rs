//! In-memory [`Storage`] implementation for tests.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{Storage, StorageError, StoredMessage};

/// In-memory, process-local [`Storage`] backend.
#[derive(Default)]
pub struct MockStorage {
    kv: RwLock<HashMap<String, Vec<u8>>>,
    sessions: RwLock<HashMap<String, Vec<StoredMessage>>>,
}

impl MockStorage {
    /// Creates an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MockStorage {
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.kv
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), value.as_bytes().to_vec());
        Ok(())
    }

    async fn load_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.kv.read().expect("lock poisoned");
        match guard.get(key) {
            Some(bytes) => String::from_utf8(bytes.clone())
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save_data(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.kv
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn load_data(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.kv.read().expect("lock poisoned").get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.kv.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.kv.read().expect("lock poisoned").contains_key(key))
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let guard = self.kv.read().expect("lock poisoned");
        let mut keys: Vec<String> = guard
            .keys()
            .filter(|k| prefix.is_none_or(|p| k.starts_with(p)))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.kv.write().expect("lock poisoned").clear();
        self.sessions.write().expect("lock poisoned").clear();
        Ok(())
    }

    async fn store_message(
        &self,
        session_id: &str,
        message: StoredMessage,
    ) -> Result<(), StorageError> {
        self.sessions
            .write()
            .expect("lock poisoned")
            .entry(session_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn retrieve_history(
        &self,
        session_id: &str,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        Ok(self
            .sessions
            .read()
            .expect("lock poisoned")
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        self.sessions
            .write()
            .expect("lock poisoned")
            .remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_load_string_roundtrip() {
        let store = MockStorage::new();
        store.save_string("greeting", "hello").await.unwrap();
        assert_eq!(
            store.load_string("greeting").await.unwrap(),
            Some("hello".to_string())
        );
    }

    #[tokio::test]
    async fn load_missing_key_is_none() {
        let store = MockStorage::new();
        assert_eq!(store.load_string("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_and_load_object_roundtrip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Thing {
            n: u32,
        }

        let store = MockStorage::new();
        store.save_object("thing", &Thing { n: 7 }).await.unwrap();
        let loaded: Option<Thing> = store.load_object("thing").await.unwrap();
        assert_eq!(loaded, Some(Thing { n: 7 }));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = MockStorage::new();
        store.save_string("k", "v").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix() {
        let store = MockStorage::new();
        store.save_string("document_1", "a").await.unwrap();
        store.save_string("document_2", "b").await.unwrap();
        store.save_string("collection_1", "c").await.unwrap();

        let mut keys = store.list_keys(Some("document_")).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["document_1", "document_2"]);
    }

    #[tokio::test]
    async fn clear_empties_both_kv_and_sessions() {
        let store = MockStorage::new();
        store.save_string("k", "v").await.unwrap();
        store
            .store_message("s1", StoredMessage::new("user", "hi", 0))
            .await
            .unwrap();

        store.clear().await.unwrap();

        assert!(!store.exists("k").await.unwrap());
        assert!(store.retrieve_history("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_history_preserves_append_order() {
        let store = MockStorage::new();
        store
            .store_message("s1", StoredMessage::new("user", "first", 1))
            .await
            .unwrap();
        store
            .store_message("s1", StoredMessage::new("assistant", "second", 2))
            .await
            .unwrap();

        let history = store.retrieve_history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
    }

    #[tokio::test]
    async fn delete_session_clears_only_that_session() {
        let store = MockStorage::new();
        store
            .store_message("s1", StoredMessage::new("user", "a", 0))
            .await
            .unwrap();
        store
            .store_message("s2", StoredMessage::new("user", "b", 0))
            .await
            .unwrap();

        store.delete_session("s1").await.unwrap();

        assert!(store.retrieve_history("s1").await.unwrap().is_empty());
        assert_eq!(store.retrieve_history("s2").await.unwrap().len(), 1);
    }
}
