//! Crash-safe JSON file persistence.
//!
//! Writes go to a sibling temp file named with the process and thread ids,
//! are synced to disk, then renamed over the target. Readers therefore see
//! either the old document or the new one, never a torn write.

use crate::error::{Result, StorageError};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::{process, thread};
use tracing::debug;

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io_with_path(e, path)),
    };

    let data = serde_json::from_str(&contents).map_err(|e| StorageError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Serialize `data` and atomically replace the file at `path`.
///
/// Parent directories are created as needed.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io_with_path(e, parent))?;
        }
    }

    let serialized = serde_json::to_string_pretty(data)?;
    let temp_path = path.with_extension(format!("{}.{}.tmp", process::id(), thread_tag()));

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| StorageError::io_with_path(e, &temp_path))?;

        file.write_all(serialized.as_bytes())
            .map_err(|e| StorageError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| StorageError::io_with_path(e, &temp_path))?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::io_with_path(e, path));
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Numeric tag for the current thread, used to keep temp names unique.
fn thread_tag() -> u64 {
    let mut hasher = DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}
