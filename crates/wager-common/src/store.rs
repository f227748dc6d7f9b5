//! Namespaced key-value storage.
//!
//! Every persisted entity (bets, guild config, reward config, facts) lives in
//! its own namespace of a single backend. Values are JSON documents; the
//! typed [`Collection`] view handles encoding.
//!
//! ## Backends
//!
//! - `MemoryBackend`: DashMap-backed, for tests and dry runs
//! - `FileBackend`: one JSON file on disk, written through on every mutation

pub mod file;
pub mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode {namespace}/{key}: {source}")]
    Encode {
        namespace: String,
        key: String,
        source: serde_json::Error,
    },

    #[error("Failed to decode {namespace}/{key}: {source}")]
    Decode {
        namespace: String,
        key: String,
        source: serde_json::Error,
    },

    #[error("Corrupt store file: {0}")]
    Corrupt(String),
}

/// Raw string storage partitioned by namespace.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch the raw value for a key.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite a key.
    async fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove a key. Returns true if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError>;

    /// All entries of a namespace, in no particular order.
    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>, StoreError>;
}

/// Typed view over one namespace of a backend.
pub struct Collection<T> {
    backend: Arc<dyn KvBackend>,
    namespace: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            namespace: self.namespace.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(backend: Arc<dyn KvBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            _marker: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.backend.get(&self.namespace, key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                namespace: self.namespace.clone(),
                key: key.to_string(),
                source,
            })
    }

    pub async fn set(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            namespace: self.namespace.clone(),
            key: key.to_string(),
            source,
        })?;
        self.backend.set(&self.namespace, key, raw).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.backend.delete(&self.namespace, key).await
    }

    /// All decodable entries. Undecodable ones are logged and skipped.
    pub async fn entries(&self) -> Result<Vec<(String, T)>, StoreError> {
        let raw = self.backend.entries(&self.namespace).await?;
        let mut out = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            match serde_json::from_str(&value) {
                Ok(decoded) => out.push((key, decoded)),
                Err(e) => warn!(
                    namespace = %self.namespace,
                    key = %key,
                    error = %e,
                    "Skipping undecodable store entry"
                ),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
        count: u32,
    }

    fn notes() -> Collection<Note> {
        Collection::new(Arc::new(MemoryBackend::new()), "notes")
    }

    #[tokio::test]
    async fn test_collection_roundtrip() {
        let coll = notes();
        let note = Note { text: "hi".to_string(), count: 2 };

        assert!(coll.get("a").await.unwrap().is_none());
        coll.set("a", &note).await.unwrap();
        assert_eq!(coll.get("a").await.unwrap(), Some(note));
    }

    #[tokio::test]
    async fn test_collection_entries_skip_corrupt() {
        let backend: Arc<dyn KvBackend> = Arc::new(MemoryBackend::new());
        let coll: Collection<Note> = Collection::new(Arc::clone(&backend), "notes");

        coll.set("good", &Note { text: "ok".to_string(), count: 1 }).await.unwrap();
        backend.set("notes", "bad", "{not json".to_string()).await.unwrap();

        let entries = coll.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "good");

        assert!(matches!(
            coll.get("bad").await,
            Err(StoreError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend: Arc<dyn KvBackend> = Arc::new(MemoryBackend::new());
        let a: Collection<u32> = Collection::new(Arc::clone(&backend), "a");
        let b: Collection<u32> = Collection::new(Arc::clone(&backend), "b");

        a.set("k", &1).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), None);
        assert_eq!(b.entries().await.unwrap().len(), 0);
    }
}
