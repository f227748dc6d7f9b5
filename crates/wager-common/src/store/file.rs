//! JSON file backend.
//!
//! The whole store is one document of the shape `{namespace: {key: value}}`.
//! Every mutation rewrites the file through a temp file and a rename, so a
//! crash mid-write leaves the previous version intact. The in-memory copy
//! only changes once the write has succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{KvBackend, StoreError};

type Document = BTreeMap<String, BTreeMap<String, String>>;

/// File-backed store that survives process restarts.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl FileBackend {
    /// Open the store at `path`, creating an empty one if the file is missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Document::new(),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            namespaces = doc.len(),
            "Opened file store"
        );

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Store flushed");
        Ok(())
    }
}

#[async_trait]
impl KvBackend for FileBackend {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        let doc = self.doc.lock().await;
        Ok(doc.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        next.entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.persist(&next).await?;
        *doc = next;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        let mut doc = self.doc.lock().await;
        if !doc.get(namespace).is_some_and(|ns| ns.contains_key(key)) {
            return Ok(false);
        }
        let mut next = doc.clone();
        if let Some(ns) = next.get_mut(namespace) {
            ns.remove(key);
        }
        self.persist(&next).await?;
        *doc = next;
        Ok(true)
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>, StoreError> {
        let doc = self.doc.lock().await;
        Ok(doc
            .get(namespace)
            .map(|ns| ns.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
