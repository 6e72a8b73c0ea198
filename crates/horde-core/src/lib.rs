#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Core types and file access for horde announcement events.
//!
//! The event store, the static client list and the JSON Schema are all plain
//! JSON files that are read completely into memory and rewritten wholesale.

pub mod error;
pub mod event;
pub mod json_io;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use event::{Event, COMMON};
pub use schema::SchemaInspector;
pub use store::EventStore;

use std::path::Path;

/// Loads the list of audience names that always receive result files.
pub fn load_static_clients(path: &Path) -> Result<Vec<String>> {
    json_io::read_json(path)
}
