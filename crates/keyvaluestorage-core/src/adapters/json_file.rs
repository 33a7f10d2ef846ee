//! [`AsyncStorage`] adapter backed by a single JSON document on disk.

use super::atomic::{read_json, write_json};
use crate::error::{Result, StorageError};
use crate::traits::AsyncStorage;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type Document = BTreeMap<String, String>;

/// Stores every key in one JSON object file.
///
/// The file is re-read on every call; caching is left to the layers above.
/// File IO runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct JsonFileAsyncStorage {
    path: Arc<PathBuf>,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileAsyncStorage {
    /// Use (or later create) the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document> {
        let path = Arc::clone(&self.path);
        let doc = tokio::task::spawn_blocking(move || read_json::<Document>(&path))
            .await
            .map_err(|e| StorageError::BackingStore {
                message: format!("File read task failed: {}", e),
                source: Some(Box::new(e)),
            })??;
        Ok(doc.unwrap_or_default())
    }

    async fn store(&self, doc: Document) -> Result<()> {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || write_json(&path, &doc))
            .await
            .map_err(|e| StorageError::BackingStore {
                message: format!("File write task failed: {}", e),
                source: Some(Box::new(e)),
            })?
    }

    async fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Document) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        if f(&mut doc) {
            debug!("Writing {} keys to {}", doc.len(), self.path.display());
            self.store(doc).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AsyncStorage for JsonFileAsyncStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|doc| {
            doc.insert(key.to_string(), value.to_string());
            true
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.modify(|doc| doc.remove(key).is_some()).await
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        Ok(self.load().await?.into_keys().collect())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let doc = self.load().await?;
        Ok(keys
            .iter()
            .map(|k| (k.clone(), doc.get(k).cloned()))
            .collect())
    }
}
