//! Pass-through backend over an [`AsyncStorage`] adapter.

use crate::codec::{self, parse_entry};
use crate::error::Result;
use crate::traits::{AsyncStorage, KeyValueStorage};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Forwards every operation straight to the adapter.
///
/// Values are JSON-encoded on write and safely decoded on read. Nothing is
/// cached.
#[derive(Clone)]
pub struct AsyncStorageBackend {
    storage: Arc<dyn AsyncStorage>,
}

impl AsyncStorageBackend {
    pub fn new(storage: Arc<dyn AsyncStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl KeyValueStorage for AsyncStorageBackend {
    async fn get_keys(&self) -> Result<Vec<String>> {
        self.storage.get_all_keys().await
    }

    async fn get_entries(&self) -> Result<Vec<(String, Value)>> {
        let keys = self.get_keys().await?;
        let entries = self.storage.multi_get(&keys).await?;
        Ok(entries.into_iter().filter_map(parse_entry).collect())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let raw = self.storage.get_item(key).await?;
        Ok(raw.map(|raw| codec::safe_json_parse(&raw)))
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let encoded = codec::encode(&value)?;
        self.storage.set_item(key, &encoded).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.storage.remove_item(key).await
    }
}
