//! In-process key-value store

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::deadline::Deadline;
use crate::error::StoreError;
use crate::stats::StoreStats;
use crate::store::KvStore;

/// Thread-safe in-memory store with no expiry and no eviction
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<AHashMap<String, Vec<u8>>>>,
    stats: Arc<StoreStats>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value
    pub fn insert(&self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.write().insert(key.into(), value);
        self.stats.record_write();
    }

    /// Look up a value, counting the hit or miss
    pub fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let value = self.entries.read().get(key).cloned();
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    /// Remove a key, returning whether it existed
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            self.stats.record_delete();
        }
        removed
    }

    /// Check for a key without touching the hit/miss counters
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every key
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Operation counters
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

impl KvStore for MemoryStore {
    fn set(&self, key: &str, value: &[u8], deadline: Deadline) -> Result<(), StoreError> {
        if deadline.is_expired() {
            return Err(StoreError::DeadlineExceeded { op: "SET" });
        }
        self.insert(key, value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str, deadline: Deadline) -> Result<Option<Vec<u8>>, StoreError> {
        if deadline.is_expired() {
            return Err(StoreError::DeadlineExceeded { op: "GET" });
        }
        Ok(self.lookup(key))
    }
}
