//! Typed requests built from parsed command-line flags.
//!
//! Flags arrive as optional strings. Each command turns its flags into a
//! request whose required fields are plain values, failing with a
//! [`UsageError`] that names the first missing field.

use clap::Args;
use horde_core::Event;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Missing required flag --{field} for '{command}'")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },
    #[error("Failed parsing {field} date: '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("'{value}' is not a valid event id")]
    InvalidId { value: String },
    #[error("Unknown channel '{channel}', allowed values: {}", allowed.join(", "))]
    UnknownChannel {
        channel: String,
        allowed: Vec<String>,
    },
}

impl UsageError {
    /// The subcommand whose usage should be shown alongside this error.
    pub fn command(&self) -> &'static str {
        match self {
            Self::MissingField { command, .. } => *command,
            Self::InvalidDate { .. } | Self::UnknownChannel { .. } => "add",
            Self::InvalidId { .. } => "remove",
        }
    }
}

fn required(
    command: &'static str,
    field: &'static str,
    value: Option<String>,
) -> Result<String, UsageError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(UsageError::MissingField { command, field }),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Splits a comma separated flag value, dropping blank entries.
fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Args, Debug, Default)]
pub struct AddArgs {
    /// The name of the event
    #[arg(long)]
    pub title: Option<String>,

    /// The date and time where the event starts, notifications won't be shown before this date
    #[arg(long)]
    pub valid_since: Option<String>,

    /// The date and time where the event ends, notifications won't be shown after this date
    #[arg(long)]
    pub valid_until: Option<String>,

    /// The longer text of the notification, describing the event
    #[arg(long)]
    pub description: Option<String>,

    /// A link that the notification will point to
    #[arg(long)]
    pub link: Option<String>,

    /// Names of the audiences this applies to (separated by comma)
    #[arg(long)]
    pub only: Option<String>,

    /// Channel names, see the schema file for valid values (separated by comma)
    #[arg(long)]
    pub channels: Option<String>,
}

/// A validated `add` invocation.
#[derive(Debug)]
pub struct AddRequest {
    pub title: String,
    pub valid_since: OffsetDateTime,
    pub valid_until: OffsetDateTime,
    pub description: Option<String>,
    pub link: Option<String>,
    pub only: Vec<String>,
    pub channels: Vec<String>,
}

impl AddArgs {
    pub fn into_request(self) -> Result<AddRequest, UsageError> {
        const COMMAND: &str = "add";
        let title = required(COMMAND, "title", self.title)?;
        let valid_since = required(COMMAND, "valid-since", self.valid_since)?;
        let valid_until = required(COMMAND, "valid-until", self.valid_until)?;

        Ok(AddRequest {
            title,
            valid_since: parse_date_field("valid-since", &valid_since)?,
            valid_until: parse_date_field("valid-until", &valid_until)?,
            description: optional(self.description),
            link: optional(self.link),
            only: split_list(self.only),
            channels: split_list(self.channels),
        })
    }
}

impl AddRequest {
    /// Rejects channels outside `allowed`. An empty `allowed` list means the
    /// schema does not restrict channels.
    pub fn check_channels(&self, allowed: &[String]) -> Result<(), UsageError> {
        if allowed.is_empty() {
            return Ok(());
        }
        match self.channels.iter().find(|c| !allowed.contains(c)) {
            Some(channel) => Err(UsageError::UnknownChannel {
                channel: channel.clone(),
                allowed: allowed.to_vec(),
            }),
            None => Ok(()),
        }
    }

    /// Builds the event with a fresh id and UTC timestamps.
    pub fn into_event(self) -> Event {
        let mut event = Event::new(self.title, self.valid_since, self.valid_until).into_utc();
        event.description = self.description;
        event.link = self.link;
        event.limited_to = self.only;
        event.channels = self.channels;
        event
    }
}

#[derive(Args, Debug, Default)]
pub struct RemoveArgs {
    /// The ID of the event you want to remove
    #[arg(long)]
    pub id: Option<String>,
}

impl RemoveArgs {
    pub fn into_id(self) -> Result<Uuid, UsageError> {
        let value = required("remove", "id", self.id)?;
        Uuid::parse_str(value.trim()).map_err(|_| UsageError::InvalidId { value })
    }
}

fn parse_date_field(field: &'static str, value: &str) -> Result<OffsetDateTime, UsageError> {
    parse_datetime(value).ok_or_else(|| UsageError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Parses the date formats accepted on the command line.
///
/// Values without an offset are taken as UTC. A bare integer is a unix
/// timestamp in seconds.
pub fn parse_datetime(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(dt);
    }

    let naive_formats = [
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ];
    for format in naive_formats {
        if let Ok(dt) = PrimitiveDateTime::parse(value, format) {
            return Some(dt.assume_utc());
        }
    }

    if let Ok(date) = Date::parse(value, format_description!("[year]-[month]-[day]")) {
        return Some(date.midnight().assume_utc());
    }

    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
}
