//! SQLite-backed key-value storage.
//!
//! One table of `(key TEXT PRIMARY KEY, value TEXT)` rows. Values are stored
//! as JSON text and safely decoded on the way out.

use crate::codec::{self, parse_entry};
use crate::config::{DatabaseLocation, SqliteOptions};
use crate::error::{Result, StorageError};
use crate::traits::KeyValueStorage;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQL text for every statement the backend runs against its table.
#[derive(Debug, Clone)]
struct Statements {
    create_table: String,
    select_keys: String,
    select_entries: String,
    select_value: String,
    replace_into: String,
    delete_key: String,
}

impl Statements {
    fn new(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY, value TEXT)"
            ),
            select_keys: format!("SELECT key FROM {table} ORDER BY key"),
            select_entries: format!("SELECT key, value FROM {table} ORDER BY key"),
            select_value: format!("SELECT value FROM {table} WHERE key = ?1"),
            replace_into: format!("REPLACE INTO {table} (key, value) VALUES (?1, ?2)"),
            delete_key: format!("DELETE FROM {table} WHERE key = ?1"),
        })
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName(table.to_string()))
    }
}

/// SQLite storage backend.
///
/// Thread-safe via an internal mutex on the connection. Statements are short
/// and run inline on the calling task.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    statements: Statements,
}

impl SqliteStorage {
    /// Open storage as described by `options`, creating the table if needed.
    pub fn open(options: &SqliteOptions) -> Result<Self> {
        let conn = match &options.database {
            DatabaseLocation::Path(path) => open_file(path)?,
            DatabaseLocation::Memory => Connection::open_in_memory().map_err(|e| {
                StorageError::Database {
                    message: format!("Failed to open in-memory database: {}", e),
                    source: Some(e),
                }
            })?,
        };
        Self::from_connection(conn, &options.table_name)
    }

    /// Open a database file with the default table.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&SqliteOptions::at_path(path.as_ref()))
    }

    /// Open a private in-memory database with the default table.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&SqliteOptions::in_memory())
    }

    /// Wrap an existing connection, creating `table_name` if needed.
    pub fn from_connection(conn: Connection, table_name: &str) -> Result<Self> {
        let statements = Statements::new(table_name)?;
        conn.execute(&statements.create_table, [])
            .map_err(|e| StorageError::Database {
                message: format!("Failed to create table {}: {}", table_name, e),
                source: Some(e),
            })?;
        debug!("SQLite storage ready (table '{}')", table_name);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            statements,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(format!("Failed to lock database: {}", e)))
    }
}

fn open_file(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                message: format!("Failed to create database directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    let conn = Connection::open(path).map_err(|e| StorageError::Database {
        message: format!("Failed to open database {}: {}", path.display(), e),
        source: Some(e),
    })?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
        .map_err(|e| StorageError::Database {
            message: format!("Failed to set pragmas: {}", e),
            source: Some(e),
        })?;

    Ok(conn)
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn get_keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&self.statements.select_keys)?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    async fn get_entries(&self) -> Result<Vec<(String, Value)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&self.statements.select_entries)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().filter_map(parse_entry).collect())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&self.statements.select_value)?;
        let raw: Option<Option<String>> = stmt
            .query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(|e| StorageError::Database {
                message: format!("Failed to read key '{}': {}", key, e),
                source: Some(e),
            })?;
        Ok(raw.flatten().map(|raw| codec::safe_json_parse(&raw)))
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let encoded = codec::encode(&value)?;
        let conn = self.lock()?;
        conn.prepare_cached(&self.statements.replace_into)?
            .execute(params![key, encoded])
            .map_err(|e| StorageError::Database {
                message: format!("Failed to write key '{}': {}", key, e),
                source: Some(e),
            })?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn
            .prepare_cached(&self.statements.delete_key)?
            .execute(params![key])?;
        if deleted > 0 {
            debug!("Removed key '{}'", key);
        }
        Ok(())
    }
}
