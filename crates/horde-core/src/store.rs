//! Access to the event store file.
//!
//! The store is a single JSON array of [`Event`]s. Every mutation loads the
//! whole list, derives a new list and rewrites the file.

use crate::error::Result;
use crate::event::Event;
use crate::json_io::{read_json, write_json_pretty};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use uuid::Uuid;

/// Handle to an event store file such as `source.json`.
#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every event in file order.
    pub fn load(&self) -> Result<Vec<Event>> {
        let events: Vec<Event> = read_json(&self.path)?;
        tracing::debug!(path = %self.path.display(), count = events.len(), "loaded events");
        Ok(events)
    }

    /// Replaces the file content with `events`.
    pub fn save(&self, events: &[Event]) -> Result<()> {
        write_json_pretty(&self.path, events)?;
        tracing::debug!(path = %self.path.display(), count = events.len(), "saved events");
        Ok(())
    }

    /// Appends `event` to the end of the store.
    pub fn add(&self, event: Event) -> Result<()> {
        let mut events = self.load()?;
        tracing::info!(id = %event.id, title = %event.title, "adding event");
        events.push(event);
        self.save(&events)
    }

    /// Removes the event with `id`. Returns `false` (and leaves the file
    /// untouched) when no such event exists.
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let (remaining, found) = without_id(self.load()?, id);
        if found {
            tracing::info!(%id, "removing event");
            self.save(&remaining)?;
        }
        Ok(found)
    }

    /// Removes every event whose window ended before `now` and returns how
    /// many were removed. The file is only rewritten when something changed.
    pub fn cleanup(&self, now: OffsetDateTime) -> Result<usize> {
        let events = self.load()?;
        let before = events.len();
        let remaining = without_expired(events, now);
        let removed = before - remaining.len();
        if removed > 0 {
            tracing::info!(removed, "removing expired events");
            self.save(&remaining)?;
        }
        Ok(removed)
    }

    /// Loads and rewrites the store so it is consistently indented.
    pub fn format(&self) -> Result<()> {
        let events = self.load()?;
        self.save(&events)
    }
}

/// Drops the first event with `id`, keeping the order of the others.
#[must_use]
pub fn without_id(events: Vec<Event>, id: Uuid) -> (Vec<Event>, bool) {
    let mut found = false;
    let remaining = events
        .into_iter()
        .filter(|event| {
            if !found && event.id == id {
                found = true;
                return false;
            }
            true
        })
        .collect();
    (remaining, found)
}

/// Keeps only events that have not expired at `now`, in their original order.
#[must_use]
pub fn without_expired(events: Vec<Event>, now: OffsetDateTime) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| !event.is_expired_at(now))
        .collect()
}
