//! In-memory key/value store.

use crate::{KeyValueStore, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Volatile store that lives as long as the process.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.data.lock().keys().cloned().collect())
    }

    fn clear(&self) -> StorageResult<usize> {
        let mut data = self.data.lock();
        let removed = data.len();
        data.clear();
        Ok(removed)
    }
}
