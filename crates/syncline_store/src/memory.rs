//! In-memory store implementations for testing.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreResult;
use crate::kv::KvStore;
use crate::record::RecordStore;

/// An in-memory key-value store.
///
/// All data lives in a process-local map and is lost on drop. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral clients that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use syncline_store::{KvStore, MemoryKvStore};
///
/// let store = MemoryKvStore::new();
/// store.put("session", b"blob").unwrap();
/// assert_eq!(store.get("session").unwrap(), Some(b"blob".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    slots: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Creates a new empty in-memory key-value store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys currently stored.
    ///
    /// Useful for testing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns `true` if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.slots.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.slots.write().remove(key);
        Ok(())
    }
}

/// An in-memory namespaced record store.
///
/// Records are held in per-namespace ordered maps, so `list` ordering
/// matches the persistent backends without extra sorting.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryRecordStore {
    /// Creates a new empty in-memory record store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in `namespace`.
    ///
    /// Useful for testing.
    #[must_use]
    pub fn record_count(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .get(namespace)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|records| records.get(key).cloned()))
    }

    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        if let Some(records) = self.namespaces.write().get_mut(namespace) {
            records.remove(key);
        }
        Ok(())
    }

    async fn list(&self, namespace: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map(|records| {
                records
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn clear(&self, namespace: &str) -> StoreResult<()> {
        self.namespaces.write().remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_new_is_empty() {
        let store = MemoryKvStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn kv_put_then_get() {
        let store = MemoryKvStore::new();
        store.put("session", b"blob").unwrap();
        assert_eq!(store.get("session").unwrap(), Some(b"blob".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn kv_put_replaces_existing() {
        let store = MemoryKvStore::new();
        store.put("session", b"old").unwrap();
        store.put("session", b"new").unwrap();
        assert_eq!(store.get("session").unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn kv_remove_missing_succeeds() {
        let store = MemoryKvStore::new();
        assert!(store.remove("missing").is_ok());
    }

    #[test]
    fn kv_remove_deletes_key() {
        let store = MemoryKvStore::new();
        store.put("session", b"blob").unwrap();
        store.remove("session").unwrap();
        assert_eq!(store.get("session").unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn record_get_missing_namespace() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.get("cache", "tasks").await.unwrap(), None);
    }

    #[tokio::test]
    async fn record_put_then_get() {
        let store = MemoryRecordStore::new();
        store.put("cache", "tasks", b"payload").await.unwrap();
        assert_eq!(
            store.get("cache", "tasks").await.unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[tokio::test]
    async fn record_namespaces_are_independent() {
        let store = MemoryRecordStore::new();
        store.put("cache", "tasks", b"a").await.unwrap();
        store.put("queue", "tasks", b"b").await.unwrap();

        assert_eq!(store.get("cache", "tasks").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.get("queue", "tasks").await.unwrap(), Some(b"b".to_vec()));

        store.clear("cache").await.unwrap();
        assert_eq!(store.get("cache", "tasks").await.unwrap(), None);
        assert_eq!(store.get("queue", "tasks").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn record_list_is_ordered_by_key() {
        let store = MemoryRecordStore::new();
        store.put("cache", "zeta", b"z").await.unwrap();
        store.put("cache", "alpha", b"a").await.unwrap();
        store.put("cache", "mid", b"m").await.unwrap();

        let records = store.list("cache").await.unwrap();
        let keys: Vec<&str> = records.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn record_list_empty_namespace() {
        let store = MemoryRecordStore::new();
        assert!(store.list("cache").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_delete_missing_succeeds() {
        let store = MemoryRecordStore::new();
        assert!(store.delete("cache", "missing").await.is_ok());
    }

    #[tokio::test]
    async fn record_delete_removes_record() {
        let store = MemoryRecordStore::new();
        store.put("cache", "tasks", b"payload").await.unwrap();
        store.delete("cache", "tasks").await.unwrap();
        assert_eq!(store.get("cache", "tasks").await.unwrap(), None);
    }

    #[tokio::test]
    async fn record_clear_unwritten_namespace_succeeds() {
        let store = MemoryRecordStore::new();
        assert!(store.clear("cache").await.is_ok());
    }
}
