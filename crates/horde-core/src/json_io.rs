//! Whole-file JSON reading and writing.
//!
//! Files are read completely before parsing and values are serialized
//! completely before the file is written. There is no locking.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Reads `path` and parses its content as `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::json(path, e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read json");
    Ok(value)
}

/// Writes `value` to `path` indented with two spaces.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(path, e))?;
    write_bytes(path, &bytes)
}

/// Writes `value` to `path` without any whitespace.
pub fn write_json_minified<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| StoreError::json(path, e))?;
    write_bytes(path, &bytes)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| StoreError::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote json");
    Ok(())
}
