//! Announcement events as stored in `source.json`.
//!
//! An [`Event`] is a notification with a validity window. It may be limited to
//! a set of audiences (client applications) and to a set of delivery channels.
//! Events without an audience restriction belong to the [`COMMON`] audience.

use serde::{Deserialize, Deserializer, Serialize};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

/// Name of the shared audience whose events every other audience inherits.
pub const COMMON: &str = "common";

/// A single announcement record.
///
/// Field names follow the camelCase layout of the JSON store. Optional fields
/// that are absent (or empty lists) are left out when serializing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique identifier across the whole store.
    pub id: Uuid,
    pub title: String,
    /// Start of the window; the event is not shown before this instant.
    #[serde(with = "time::serde::rfc3339")]
    pub valid_since: OffsetDateTime,
    /// End of the window; the event is not shown after this instant.
    #[serde(with = "time::serde::rfc3339")]
    pub valid_until: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Audiences this event is restricted to. Empty means [`COMMON`].
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub limited_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub channels: Vec<String>,
}

/// Reads an explicit `null` list as an empty one.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Event {
    /// Creates an event with a fresh v4 id and no optional fields set.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        valid_since: OffsetDateTime,
        valid_until: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            valid_since,
            valid_until,
            description: None,
            limited_to: Vec::new(),
            link: None,
            channels: Vec::new(),
        }
    }

    /// Returns the event with both window bounds converted to UTC.
    #[must_use]
    pub fn into_utc(mut self) -> Self {
        self.valid_since = self.valid_since.to_offset(UtcOffset::UTC);
        self.valid_until = self.valid_until.to_offset(UtcOffset::UTC);
        self
    }

    /// Whether `now` lies inside the validity window. Both bounds are inclusive.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        self.valid_since <= now && now <= self.valid_until
    }

    /// Whether the window ended before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.valid_until
    }

    /// The audiences this event goes to, defaulting to [`COMMON`].
    #[must_use]
    pub fn audiences(&self) -> Vec<String> {
        if self.limited_to.is_empty() {
            vec![COMMON.to_string()]
        } else {
            self.limited_to.clone()
        }
    }
}
