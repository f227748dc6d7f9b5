//! In-memory backend.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{KvBackend, StoreError};

/// DashMap-backed store. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<(String, String), String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys across all namespaces.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .map(|v| v.value().clone()))
    }

    async fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        self.entries
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().0 == namespace)
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect())
    }
}
