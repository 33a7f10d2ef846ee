//! Uniform async key-value storage with interchangeable backends.
//!
//! Every backend implements [`KeyValueStorage`], so callers can swap them
//! without code changes:
//!
//! - [`SqliteStorage`]: rows in an embedded SQLite table.
//! - [`AsyncStorageBackend`]: straight pass-through to an [`AsyncStorage`]
//!   adapter.
//! - [`NamespacedStorage`]: a namespaced in-memory snapshot mirrored to a
//!   single key of an [`AsyncStorage`], loaded once on first use and written
//!   back whole after every change.
//!
//! # Example
//!
//! ```rust,no_run
//! use keyvaluestorage::{
//!     KeyValueStorage, MemoryAsyncStorage, NamespacedOptions, NamespacedStorage,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> keyvaluestorage::Result<()> {
//!     let backing = Arc::new(MemoryAsyncStorage::new());
//!     let storage = NamespacedStorage::with_options(
//!         backing,
//!         NamespacedOptions::default().with_prefix("app"),
//!     );
//!
//!     storage.set_item("user", json!({"id": 1})).await?;
//!     println!("{:?}", storage.get_entries().await?);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod codec;
pub mod config;
pub mod error;
pub mod namespaced;

mod async_storage;
mod sqlite;
mod traits;

pub use adapters::{JsonFileAsyncStorage, MemoryAsyncStorage};
pub use async_storage::AsyncStorageBackend;
pub use codec::Snapshot;
pub use config::{DatabaseLocation, NamespacedOptions, SqliteOptions, StorageConfig};
pub use error::{Result, StorageError};
pub use namespaced::NamespacedStorage;
pub use sqlite::SqliteStorage;
pub use traits::{AsyncStorage, KeyValueStorage, KeyValueStorageExt};
