//! Reads the JSON Schema that describes the event store.
//!
//! Only two things are taken from the schema: the enumeration of allowed
//! channel names (`items.properties.channels.items.enum`) and, for the
//! `validate` command, the schema as a whole.

use crate::error::{Result, StoreError};
use crate::json_io::read_json;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::path::{Path, PathBuf};

const CHANNELS_ENUM_POINTER: &str = "/items/properties/channels/items/enum";

#[derive(Debug, Clone)]
pub struct SchemaInspector {
    path: PathBuf,
}

impl SchemaInspector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Channel names accepted by the schema. A schema without a channel
    /// enumeration yields an empty list.
    pub fn allowed_channels(&self) -> Result<Vec<String>> {
        let schema: Value = read_json(&self.path)?;
        Ok(channels_enum(&schema))
    }

    /// Validates the JSON document at `document` against the schema.
    ///
    /// Returns one message per violation; an empty list means the document
    /// is valid.
    pub fn validate_file(&self, document: &Path) -> Result<Vec<String>> {
        let schema: Value = read_json(&self.path)?;
        let data: Value = read_json(document)?;
        validate_value(&schema, &data)
    }
}

fn channels_enum(schema: &Value) -> Vec<String> {
    schema
        .pointer(CHANNELS_ENUM_POINTER)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn validate_value(schema: &Value, data: &Value) -> Result<Vec<String>> {
    let compiled = JSONSchema::compile(schema).map_err(|e| StoreError::Schema(e.to_string()))?;
    let violations = match compiled.validate(data) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| format!("{}: {}", display_pointer(&e.instance_path.to_string()), e))
            .collect(),
    };
    tracing::debug!(violations = violations.len(), "validated document");
    Ok(violations)
}

fn display_pointer(pointer: &str) -> &str {
    if pointer.is_empty() {
        "(root)"
    } else {
        pointer
    }
}
