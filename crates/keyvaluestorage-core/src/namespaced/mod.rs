//! Namespaced in-memory mirror over an [`AsyncStorage`].
//!
//! The whole namespace lives in one snapshot stored under a single backing
//! key. The snapshot is loaded lazily on first use, with concurrent first
//! callers coalesced onto one fetch, then served from memory. Every mutation
//! writes the entire snapshot back.

mod keys;
mod state;

pub use keys::{mangle, unmangle};

use crate::codec::{self, Snapshot};
use crate::config::NamespacedOptions;
use crate::error::{Result, StorageError};
use crate::traits::{AsyncStorage, KeyValueStorage};
use async_trait::async_trait;
use serde_json::Value;
use state::{CacheState, LoadGuard, Ticket};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Lazily loaded, namespaced snapshot cache.
///
/// Keys are stored as `prefix + separator + key`. Only keys inside this
/// namespace are visible through [`get_keys`](KeyValueStorage::get_keys) and
/// [`get_entries`](KeyValueStorage::get_entries), so several caches with
/// different prefixes can share a snapshot key without seeing each other's
/// entries. They still overwrite each other's persisted snapshot, though:
/// give each cache its own snapshot key unless that is intended.
///
/// Concurrent mutations race on the in-memory snapshot (last write wins).
/// Persistence writes are serialized and always encode the current snapshot,
/// so the last write to land matches memory.
pub struct NamespacedStorage {
    store: Arc<dyn AsyncStorage>,
    prefix: String,
    separator: String,
    snapshot_key: String,
    /// Load state and snapshot. Never held across an await.
    state: Mutex<CacheState>,
    /// Orders snapshot writes to the backing store.
    persist_gate: tokio::sync::Mutex<()>,
}

impl NamespacedStorage {
    /// Create a cache over `store` with the default namespace settings.
    pub fn new(store: Arc<dyn AsyncStorage>) -> Self {
        Self::with_options(store, NamespacedOptions::default())
    }

    /// Create a cache over `store` with explicit namespace settings.
    pub fn with_options(store: Arc<dyn AsyncStorage>, options: NamespacedOptions) -> Self {
        Self {
            store,
            prefix: options.prefix,
            separator: options.separator,
            snapshot_key: options.snapshot_key,
            state: Mutex::new(CacheState::new()),
            persist_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Namespace prefix prepended to every logical key.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Separator between the prefix and a logical key.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Backing-store key the snapshot is persisted under.
    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    /// Whether the snapshot has been loaded from the backing store.
    pub fn is_loaded(&self) -> bool {
        state::lock(&self.state).is_loaded()
    }

    fn mangle(&self, key: &str) -> String {
        mangle(&self.prefix, &self.separator, key)
    }

    /// Make sure the snapshot is loaded, loading it or waiting for the
    /// in-flight load as needed.
    async fn ensure_loaded(&self) -> Result<()> {
        loop {
            let ticket = state::lock(&self.state).ticket();
            match ticket {
                Ticket::Ready => return Ok(()),
                Ticket::Load => return self.load_snapshot().await,
                Ticket::Wait(rx) => match rx.await {
                    Ok(outcome) => return outcome.map_err(StorageError::LoadFailed),
                    // The loading caller went away mid-fetch.
                    Err(_) => debug!("Snapshot load for '{}' abandoned, retrying", self.snapshot_key),
                },
            }
        }
    }

    /// Fetch and install the snapshot. Only the caller holding the
    /// [`Ticket::Load`] runs this.
    async fn load_snapshot(&self) -> Result<()> {
        let mut guard = LoadGuard::new(&self.state);
        debug!("Loading snapshot '{}'", self.snapshot_key);
        let fetched = self.store.get_item(&self.snapshot_key).await;

        match fetched {
            Ok(raw) => {
                let snapshot = self.decode(raw.as_deref());
                let count = snapshot.len();
                let waiters = state::lock(&self.state).finish_load(snapshot);
                guard.disarm();
                debug!(
                    "Loaded snapshot '{}' ({} entries, {} waiters)",
                    self.snapshot_key,
                    count,
                    waiters.len()
                );
                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
                Ok(())
            }
            Err(e) => {
                let waiters = state::lock(&self.state).fail_load();
                guard.disarm();
                warn!(
                    "Failed to load snapshot '{}': {} ({} waiters rejected)",
                    self.snapshot_key,
                    e,
                    waiters.len()
                );
                let err = Arc::new(e);
                for waiter in waiters {
                    let _ = waiter.send(Err(Arc::clone(&err)));
                }
                Err(StorageError::LoadFailed(err))
            }
        }
    }

    /// Decode a fetched snapshot; absent or malformed data is an empty one.
    fn decode(&self, raw: Option<&str>) -> Snapshot {
        let Some(raw) = raw else {
            return Snapshot::new();
        };
        codec::decode_snapshot(raw).unwrap_or_else(|| {
            warn!(
                "Snapshot '{}' is not a JSON object ({} bytes), starting empty",
                self.snapshot_key,
                raw.len()
            );
            Snapshot::new()
        })
    }

    /// Write the whole snapshot to the backing store.
    async fn persist(&self) -> Result<()> {
        let _gate = self.persist_gate.lock().await;
        let (encoded, count) = {
            let state = state::lock(&self.state);
            (codec::encode(&state.snapshot)?, state.snapshot.len())
        };
        self.store.set_item(&self.snapshot_key, &encoded).await?;
        debug!(
            "Persisted snapshot '{}' ({} entries, {} bytes)",
            self.snapshot_key,
            count,
            encoded.len()
        );
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for NamespacedStorage {
    async fn get_keys(&self) -> Result<Vec<String>> {
        self.ensure_loaded().await?;
        let state = state::lock(&self.state);
        Ok(state
            .snapshot
            .keys()
            .filter_map(|k| unmangle(&self.prefix, &self.separator, k))
            .map(str::to_string)
            .collect())
    }

    async fn get_entries(&self) -> Result<Vec<(String, Value)>> {
        self.ensure_loaded().await?;
        let state = state::lock(&self.state);
        Ok(state
            .snapshot
            .iter()
            .filter_map(|(k, v)| {
                unmangle(&self.prefix, &self.separator, k).map(|k| (k.to_string(), v.clone()))
            })
            .collect())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_loaded().await?;
        let mangled = self.mangle(key);
        Ok(state::lock(&self.state).snapshot.get(&mangled).cloned())
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        self.ensure_loaded().await?;
        let mangled = self.mangle(key);
        state::lock(&self.state).snapshot.insert(mangled, value);
        self.persist().await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.ensure_loaded().await?;
        let mangled = self.mangle(key);
        state::lock(&self.state).snapshot.shift_remove(&mangled);
        self.persist().await
    }
}
