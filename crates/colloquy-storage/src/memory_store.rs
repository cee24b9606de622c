//! In-process key-value store for tests and local development.

use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;

use crate::KeyValueStore;

/// Hash-map store guarded by a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let entries = self.entries.read();
        Ok(keys.iter().map(|key| entries.get(key).cloned()).collect())
    }

    fn mset(&self, batch: &[(String, Vec<u8>)]) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in batch {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_for_missing_key() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn batched_calls_match_single_calls() {
        let store = MemoryKvStore::new();

        store
            .mset(&[
                ("a".to_string(), b"1".to_vec()),
                ("b".to_string(), b"2".to_vec()),
            ])
            .unwrap();

        let values = store
            .mget(&["a".to_string(), "missing".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(values[0], store.get("a").unwrap());
        assert_eq!(values[1], None);
        assert_eq!(values[2], store.get("b").unwrap());
        assert_eq!(store.len(), 2);
    }
}
