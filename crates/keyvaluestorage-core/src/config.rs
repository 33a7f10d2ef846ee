//! Centralized configuration for the storage backends.
//!
//! Default constants live on [`StorageConfig`]; per-backend construction
//! parameters are the `*Options` structs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage-wide defaults.
pub struct StorageConfig;

impl StorageConfig {
    /// Namespace prefix used by the namespaced backend.
    pub const DEFAULT_PREFIX: &'static str = "keyvaluestorage";
    /// Separator between the namespace prefix and a logical key.
    pub const DEFAULT_SEPARATOR: &'static str = ":";
    /// Backing-store key holding the serialized snapshot.
    pub const DEFAULT_SNAPSHOT_KEY: &'static str = "keyvaluestorage-snapshot";
    /// SQLite table used by the relational backend.
    pub const DEFAULT_TABLE_NAME: &'static str = "keyvaluestorage";
}

/// Construction parameters for [`NamespacedStorage`](crate::NamespacedStorage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct NamespacedOptions {
    /// Namespace prefix; fixed for the lifetime of the cache.
    pub prefix: String,
    /// Separator between prefix and logical key.
    pub separator: String,
    /// Key under which the whole snapshot is stored in the backing store.
    pub snapshot_key: String,
}

impl Default for NamespacedOptions {
    fn default() -> Self {
        Self {
            prefix: StorageConfig::DEFAULT_PREFIX.to_string(),
            separator: StorageConfig::DEFAULT_SEPARATOR.to_string(),
            snapshot_key: StorageConfig::DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

impl NamespacedOptions {
    /// Set the namespace prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the prefix/key separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Set the backing-store snapshot key.
    pub fn with_snapshot_key(mut self, snapshot_key: impl Into<String>) -> Self {
        self.snapshot_key = snapshot_key.into();
        self
    }
}

/// Where the relational backend keeps its database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseLocation {
    /// A database file on disk; parent directories are created on open.
    Path(PathBuf),
    /// A private in-memory database, gone when the connection closes.
    Memory,
}

/// Construction parameters for [`SqliteStorage`](crate::SqliteStorage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SqliteOptions {
    pub database: DatabaseLocation,
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

fn default_table_name() -> String {
    StorageConfig::DEFAULT_TABLE_NAME.to_string()
}

impl SqliteOptions {
    /// Options for a database file at `path` using the default table.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseLocation::Path(path.into()),
            table_name: default_table_name(),
        }
    }

    /// Options for an in-memory database using the default table.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            table_name: default_table_name(),
        }
    }

    /// Override the table name.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }
}
