//! JSON codec shared by every backend.
//!
//! Decoding never fails: malformed input either falls back to the raw string
//! ([`safe_json_parse`]) or reads as "no data" ([`decode_snapshot`]).

use crate::error::{Result, StorageError};
use serde::Serialize;
use serde_json::{Map, Value};

/// The in-memory mapping mirrored by the namespaced backend.
///
/// Backed by serde_json's insertion-ordered map.
pub type Snapshot = Map<String, Value>;

/// Encode a value as compact JSON.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Json {
        message: format!("Failed to encode value: {}", e),
        source: Some(e),
    })
}

/// Decode a stored string, falling back to the string itself when it is not
/// valid JSON.
pub fn safe_json_parse(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Pair a stored key with its decoded value, dropping keys with no value.
pub fn parse_entry((key, raw): (String, Option<String>)) -> Option<(String, Value)> {
    raw.map(|raw| (key, safe_json_parse(&raw)))
}

/// Decode a persisted snapshot.
///
/// Returns `None` for anything that is not a JSON object.
pub fn decode_snapshot(raw: &str) -> Option<Snapshot> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
