//! Storage contracts.
//!
//! [`KeyValueStorage`] is the interface callers program against; every backend
//! implements it identically so backends can be swapped without code changes.
//! [`AsyncStorage`] is the raw string-to-string primitive the async-storage
//! and namespaced backends sit on.

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Uniform async key-value storage.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Prepare the backend. Backends that need no setup return immediately.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Release the backend. Does not invalidate previously read data.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// List every key visible to this storage.
    async fn get_keys(&self) -> Result<Vec<String>>;

    /// List every `(key, value)` pair visible to this storage.
    async fn get_entries(&self) -> Result<Vec<(String, Value)>>;

    /// Read a value. Returns `None` if the key doesn't exist.
    async fn get_item(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, overwriting any existing one.
    async fn set_item(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a key. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Typed helpers over any [`KeyValueStorage`].
#[async_trait]
pub trait KeyValueStorageExt: KeyValueStorage {
    /// Read a value and deserialize it into `T`.
    async fn get_item_as<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get_item(key).await? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                StorageError::Json {
                    message: format!("Failed to decode value for '{}': {}", key, e),
                    source: Some(e),
                }
            }),
            None => Ok(None),
        }
    }

    /// Serialize `value` and write it.
    async fn set_item_as<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_item(key, value).await
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorageExt for S {}

/// Asynchronous string key-value primitive.
///
/// Implementations may be slow and may fail; callers surface failures as
/// [`StorageError::BackingStore`].
#[async_trait]
pub trait AsyncStorage: Send + Sync {
    /// Fetch the raw value stored under `key`.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`; absent keys are ignored.
    async fn remove_item(&self, key: &str) -> Result<()>;

    /// List every stored key.
    async fn get_all_keys(&self) -> Result<Vec<String>>;

    /// Fetch several keys at once, in request order.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            entries.push((key.clone(), self.get_item(key).await?));
        }
        Ok(entries)
    }
}
