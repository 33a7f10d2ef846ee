//! Backend selection and command execution.

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use keyvaluestorage::{
    codec, AsyncStorageBackend, JsonFileAsyncStorage, KeyValueStorage, NamespacedOptions,
    NamespacedStorage, SqliteOptions, SqliteStorage, StorageConfig,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Which storage implementation to open.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Rows in an SQLite table
    Sqlite,
    /// One JSON file, one entry per key
    File,
    /// Namespaced snapshot stored under one key of a JSON file
    Namespaced,
}

#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Storage backend
    #[arg(short, long, value_enum, default_value_t = Backend::Sqlite, global = true)]
    pub backend: Backend,

    /// Database or JSON file path
    #[arg(short, long, default_value = "keyvaluestorage.db", global = true)]
    pub path: PathBuf,

    /// SQLite table name
    #[arg(long, default_value = StorageConfig::DEFAULT_TABLE_NAME, global = true)]
    pub table: String,

    /// Namespace prefix (namespaced backend)
    #[arg(long, default_value = StorageConfig::DEFAULT_PREFIX, global = true)]
    pub prefix: String,

    /// Prefix/key separator (namespaced backend)
    #[arg(long, default_value = StorageConfig::DEFAULT_SEPARATOR, global = true)]
    pub separator: String,

    /// Key holding the snapshot (namespaced backend)
    #[arg(long, default_value = StorageConfig::DEFAULT_SNAPSHOT_KEY, global = true)]
    pub snapshot_key: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the value stored under KEY
    Get { key: String },
    /// Store VALUE under KEY (VALUE is parsed as JSON, else kept as a string)
    Set { key: String, value: String },
    /// Delete KEY
    Remove { key: String },
    /// List all keys
    Keys,
    /// List all entries as a JSON object
    Entries,
}

/// Open the backend described by `args`.
pub fn open_backend(args: &StorageArgs) -> Result<Box<dyn KeyValueStorage>> {
    let storage: Box<dyn KeyValueStorage> = match args.backend {
        Backend::Sqlite => Box::new(
            SqliteStorage::open(
                &SqliteOptions::at_path(&args.path).with_table_name(args.table.clone()),
            )
            .with_context(|| format!("Failed to open SQLite database {}", args.path.display()))?,
        ),
        Backend::File => Box::new(AsyncStorageBackend::new(Arc::new(
            JsonFileAsyncStorage::new(&args.path),
        ))),
        Backend::Namespaced => Box::new(NamespacedStorage::with_options(
            Arc::new(JsonFileAsyncStorage::new(&args.path)),
            NamespacedOptions::default()
                .with_prefix(args.prefix.clone())
                .with_separator(args.separator.clone())
                .with_snapshot_key(args.snapshot_key.clone()),
        )),
    };
    Ok(storage)
}

/// Run `command`, returning the JSON to print, if any.
pub async fn run(storage: &dyn KeyValueStorage, command: Command) -> Result<Option<Value>> {
    match command {
        Command::Get { key } => {
            let value = storage
                .get_item(&key)
                .await
                .with_context(|| format!("Failed to read '{}'", key))?;
            Ok(Some(value.unwrap_or(Value::Null)))
        }
        Command::Set { key, value } => {
            storage
                .set_item(&key, codec::safe_json_parse(&value))
                .await
                .with_context(|| format!("Failed to write '{}'", key))?;
            info!("Stored '{}'", key);
            Ok(None)
        }
        Command::Remove { key } => {
            storage
                .remove_item(&key)
                .await
                .with_context(|| format!("Failed to remove '{}'", key))?;
            info!("Removed '{}'", key);
            Ok(None)
        }
        Command::Keys => Ok(Some(json!(storage.get_keys().await?))),
        Command::Entries => {
            let entries: serde_json::Map<String, Value> =
                storage.get_entries().await?.into_iter().collect();
            Ok(Some(Value::Object(entries)))
        }
    }
}
