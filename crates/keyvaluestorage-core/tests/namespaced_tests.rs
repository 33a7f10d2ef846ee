//! Behavioral tests for the namespaced snapshot cache.
//!
//! These run the cache against an instrumented backing store that counts
//! calls, can hold fetches open until released, and can be told to fail.

use async_trait::async_trait;
use futures::future::join_all;
use keyvaluestorage::{
    AsyncStorage, KeyValueStorage, KeyValueStorageExt, MemoryAsyncStorage, NamespacedOptions,
    NamespacedStorage, StorageError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Backing store wrapper that records traffic.
#[derive(Default)]
struct RecordingStorage {
    inner: MemoryAsyncStorage,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
    /// When present, fetches wait here until the test opens the gate.
    gate: Option<Semaphore>,
    writes: Mutex<Vec<(String, String)>>,
}

impl RecordingStorage {
    fn new() -> Self {
        Self::default()
    }

    fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    fn seeded(key: &str, value: &str) -> Self {
        Self {
            inner: MemoryAsyncStorage::with_entries([(key, value)]),
            ..Self::default()
        }
    }

    fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn last_write(&self, key: &str) -> Option<Value> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| serde_json::from_str(v).unwrap())
    }
}

#[async_trait]
impl AsyncStorage for RecordingStorage {
    async fn get_item(&self, key: &str) -> keyvaluestorage::Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::backing_store("get refused"));
        }
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> keyvaluestorage::Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(StorageError::backing_store("set refused"));
        }
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> keyvaluestorage::Result<()> {
        self.inner.remove_item(key).await
    }

    async fn get_all_keys(&self) -> keyvaluestorage::Result<Vec<String>> {
        self.inner.get_all_keys().await
    }
}

fn options(prefix: &str, snapshot_key: &str) -> NamespacedOptions {
    NamespacedOptions::default()
        .with_prefix(prefix)
        .with_separator(":")
        .with_snapshot_key(snapshot_key)
}

fn cache_over(store: &Arc<RecordingStorage>, prefix: &str) -> NamespacedStorage {
    NamespacedStorage::with_options(store.clone(), options(prefix, "store"))
}

/// Wait until the cache has issued `n` fetches, then let them complete.
async fn release_after_fetches(store: &RecordingStorage, n: usize) {
    while store.gets() < n {
        tokio::task::yield_now().await;
    }
    store.open_gate();
}

#[tokio::test]
async fn test_concurrent_cold_reads_share_one_fetch() {
    let store = Arc::new(RecordingStorage::gated());
    store
        .inner
        .set_item("store", r#"{"app:k":"v"}"#)
        .await
        .unwrap();
    let cache = cache_over(&store, "app");

    let reads = join_all((0..10).map(|_| cache.get_item("k")));
    let (results, ()) = tokio::join!(reads, release_after_fetches(&store, 1));

    assert_eq!(store.gets(), 1);
    for result in results {
        assert_eq!(result.unwrap(), Some(json!("v")));
    }
    assert!(cache.is_loaded());

    // Loaded caches never fetch again.
    cache.get_keys().await.unwrap();
    assert_eq!(store.gets(), 1);
}

#[tokio::test]
async fn test_load_failure_reaches_every_waiter_then_retries() {
    let store = Arc::new(RecordingStorage::gated());
    store.fail_gets.store(true, Ordering::SeqCst);
    let cache = cache_over(&store, "app");

    let reads = join_all((0..5).map(|_| cache.get_item("k")));
    let (results, ()) = tokio::join!(reads, release_after_fetches(&store, 1));

    assert_eq!(store.gets(), 1);
    assert_eq!(results.len(), 5);
    for result in results {
        match result {
            Err(StorageError::LoadFailed(cause)) => {
                assert!(matches!(*cause, StorageError::BackingStore { .. }));
            }
            other => panic!("expected LoadFailed, got {:?}", other),
        }
    }
    assert!(!cache.is_loaded());

    // The failed load left the cache unloaded, so the next call fetches again.
    store.fail_gets.store(false, Ordering::SeqCst);
    assert_eq!(cache.get_item("k").await.unwrap(), None);
    assert_eq!(store.gets(), 2);
    assert!(cache.is_loaded());
}

#[tokio::test]
async fn test_dropped_loader_hands_load_to_waiter() {
    let store = Arc::new(RecordingStorage::gated());
    let cache = cache_over(&store, "app");

    let mut loader = Box::pin(cache.get_item("k"));
    assert!(futures::poll!(loader.as_mut()).is_pending());
    let mut waiter = Box::pin(cache.get_item("k"));
    assert!(futures::poll!(waiter.as_mut()).is_pending());

    drop(loader);
    store.open_gate();

    assert_eq!(waiter.await.unwrap(), None);
    assert_eq!(store.gets(), 2);
    assert!(cache.is_loaded());
}

#[tokio::test]
async fn test_round_trip() {
    let store = Arc::new(RecordingStorage::new());
    let cache = cache_over(&store, "app");

    let value = json!({"name": "ada", "tags": ["x", "y"], "n": 1.5, "none": null});
    cache.set_item("profile", value.clone()).await.unwrap();
    assert_eq!(cache.get_item("profile").await.unwrap(), Some(value.clone()));

    // A fresh cache over the same store decodes the persisted snapshot.
    let reloaded = cache_over(&store, "app");
    assert_eq!(reloaded.get_item("profile").await.unwrap(), Some(value));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    scopes: Vec<String>,
}

#[tokio::test]
async fn test_typed_round_trip() {
    let store = Arc::new(RecordingStorage::new());
    let cache = cache_over(&store, "app");

    let session = Session {
        user_id: 7,
        scopes: vec!["read".into(), "write".into()],
    };
    cache.set_item_as("session", &session).await.unwrap();
    let read: Option<Session> = cache.get_item_as("session").await.unwrap();
    assert_eq!(read, Some(session));

    cache.set_item("broken", json!("not a session")).await.unwrap();
    let result = cache.get_item_as::<Session>("broken").await;
    assert!(matches!(result, Err(StorageError::Json { .. })));
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let store = Arc::new(RecordingStorage::new());
    let app = NamespacedStorage::with_options(store.clone(), options("app", "app-store"));
    let other = NamespacedStorage::with_options(store.clone(), options("other", "other-store"));

    app.set_item("shared", json!(1)).await.unwrap();
    other.set_item("shared", json!(2)).await.unwrap();
    other.set_item("only-other", json!(3)).await.unwrap();

    assert_eq!(app.get_keys().await.unwrap(), vec!["shared"]);
    assert_eq!(
        app.get_entries().await.unwrap(),
        vec![("shared".to_string(), json!(1))]
    );
    assert_eq!(other.get_keys().await.unwrap(), vec!["shared", "only-other"]);
}

#[tokio::test]
async fn test_foreign_namespace_in_shared_snapshot_is_invisible() {
    let store = Arc::new(RecordingStorage::new());
    cache_over(&store, "app")
        .set_item("x", json!(true))
        .await
        .unwrap();

    let other = cache_over(&store, "other");
    assert!(other.get_keys().await.unwrap().is_empty());
    assert!(other.get_entries().await.unwrap().is_empty());
    assert_eq!(other.get_item("x").await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_absent_key_is_noop() {
    let store = Arc::new(RecordingStorage::new());
    let cache = cache_over(&store, "app");
    cache.set_item("keep", json!("me")).await.unwrap();

    cache.remove_item("ghost").await.unwrap();

    assert_eq!(cache.get_keys().await.unwrap(), vec!["keep"]);
    assert_eq!(store.last_write("store"), Some(json!({"app:keep": "me"})));
}

#[tokio::test]
async fn test_every_mutation_writes_whole_snapshot_once() {
    let store = Arc::new(RecordingStorage::new());
    let cache = cache_over(&store, "app");

    cache.get_item("warm").await.unwrap();
    assert_eq!(store.sets(), 0);

    cache.set_item("a", json!(1)).await.unwrap();
    assert_eq!(store.sets(), 1);
    assert_eq!(store.last_write("store"), Some(json!({"app:a": 1})));

    cache.set_item("b", json!(2)).await.unwrap();
    assert_eq!(store.sets(), 2);
    assert_eq!(store.last_write("store"), Some(json!({"app:a": 1, "app:b": 2})));

    cache.remove_item("a").await.unwrap();
    assert_eq!(store.sets(), 3);
    assert_eq!(store.last_write("store"), Some(json!({"app:b": 2})));

    cache.get_entries().await.unwrap();
    cache.get_keys().await.unwrap();
    assert_eq!(store.sets(), 3);
}

#[tokio::test]
async fn test_concurrent_mutations_leave_store_matching_memory() {
    let store = Arc::new(RecordingStorage::new());
    let cache = cache_over(&store, "app");

    let writes = join_all((0..8).map(|i| cache.set_item(&KEYS[i], json!(i))));
    for result in writes.await {
        result.unwrap();
    }

    assert_eq!(store.sets(), 8);
    let entries: serde_json::Map<String, Value> = cache
        .get_entries()
        .await
        .unwrap()
        .into_iter()
        .map(|(k, v)| (format!("app:{}", k), v))
        .collect();
    assert_eq!(store.last_write("store"), Some(Value::Object(entries)));
}

const KEYS: [&str; 8] = ["k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7"];

#[tokio::test]
async fn test_failed_persist_is_reported() {
    let store = Arc::new(RecordingStorage::new());
    let cache = cache_over(&store, "app");
    store.fail_sets.store(true, Ordering::SeqCst);

    let result = cache.set_item("k", json!(1)).await;
    assert!(matches!(result, Err(StorageError::BackingStore { .. })));
    assert!(result.unwrap_err().is_retryable());

    // Memory stays authoritative; the rejected write is still visible.
    assert_eq!(cache.get_item("k").await.unwrap(), Some(json!(1)));

    store.fail_sets.store(false, Ordering::SeqCst);
    cache.set_item("j", json!(2)).await.unwrap();
    assert_eq!(store.last_write("store"), Some(json!({"app:k": 1, "app:j": 2})));
}

#[tokio::test]
async fn test_malformed_snapshot_loads_empty() {
    let store = Arc::new(RecordingStorage::seeded("store", "{{{ definitely not json"));
    let cache = cache_over(&store, "app");

    assert!(cache.get_keys().await.unwrap().is_empty());
    assert!(cache.is_loaded());

    cache.set_item("fresh", json!(1)).await.unwrap();
    assert_eq!(store.last_write("store"), Some(json!({"app:fresh": 1})));
}

#[tokio::test]
async fn test_non_object_snapshot_loads_empty() {
    let store = Arc::new(RecordingStorage::seeded("store", "[1, 2, 3]"));
    let cache = cache_over(&store, "app");
    assert!(cache.get_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_documented_scenario() {
    let store = Arc::new(RecordingStorage::new());
    let cache = cache_over(&store, "app");

    cache.set_item("user", json!({"id": 1})).await.unwrap();

    assert_eq!(
        cache.get_entries().await.unwrap(),
        vec![("user".to_string(), json!({"id": 1}))]
    );
    let raw = store.inner.get_item("store").await.unwrap().unwrap();
    assert_eq!(raw, r#"{"app:user":{"id":1}}"#);
}

#[tokio::test]
async fn test_default_options() {
    let store = Arc::new(RecordingStorage::new());
    let cache = NamespacedStorage::new(store.clone());
    assert_eq!(cache.prefix(), "keyvaluestorage");
    assert_eq!(cache.separator(), ":");
    assert_eq!(cache.snapshot_key(), "keyvaluestorage-snapshot");

    cache.set_item("k", json!(1)).await.unwrap();
    assert_eq!(
        store.last_write("keyvaluestorage-snapshot"),
        Some(json!({"keyvaluestorage:k": 1}))
    );
}
