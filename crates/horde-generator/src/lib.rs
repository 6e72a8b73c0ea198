#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Per-audience result generation.
//!
//! The [`ResultGenerator`] takes the full event list and the static client
//! list, keeps the events that are active right now and fans them out into
//! one bucket per audience. Events of the [`COMMON`] audience are inherited by
//! every other audience. Each bucket is written twice, as
//! `results.<audience>.json` (indented) and `results.<audience>.min.json`.

pub mod error;

pub use error::{GeneratorError, Result};

use horde_core::json_io::{write_json_minified, write_json_pretty};
use horde_core::{Event, COMMON};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use time::{OffsetDateTime, UtcOffset};

/// Events per audience, ordered by audience name.
pub type Buckets = BTreeMap<String, Vec<Event>>;

/// Builds and writes the per-audience result files.
#[derive(Debug)]
pub struct ResultGenerator {
    static_clients: Vec<String>,
    events: Vec<Event>,
    output_dir: PathBuf,
}

impl ResultGenerator {
    /// Creates a generator writing into the current directory.
    #[must_use]
    pub fn new(static_clients: Vec<String>, events: Vec<Event>) -> Self {
        Self {
            static_clients,
            events,
            output_dir: PathBuf::from("."),
        }
    }

    /// Writes the result files into `dir` instead of the current directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Computes the buckets for the instant `now`.
    ///
    /// Fails on the first repeated event id and on audience names that cannot
    /// be used as part of a file name. Nothing is written.
    pub fn buckets_at(&self, now: OffsetDateTime) -> Result<Buckets> {
        let now = now.to_offset(UtcOffset::UTC);
        let mut seen = HashSet::with_capacity(self.events.len());
        let mut buckets = Buckets::new();

        for event in &self.events {
            let mut event = event.clone().into_utc();

            if !seen.insert(event.id) {
                return Err(GeneratorError::DuplicateId(event.id));
            }
            if !event.is_active_at(now) {
                tracing::debug!(id = %event.id, "skipping inactive event");
                continue;
            }

            event.limited_to = event.audiences();
            let mut targeted = HashSet::new();
            for audience in &event.limited_to {
                if !targeted.insert(audience.as_str()) {
                    continue;
                }
                check_audience(audience)?;
                buckets
                    .entry(audience.clone())
                    .or_default()
                    .push(event.clone());
            }
        }

        for client in &self.static_clients {
            check_audience(client)?;
            buckets.entry(client.clone()).or_default();
        }
        let common = buckets.entry(COMMON.to_string()).or_default().clone();

        for (audience, events) in &mut buckets {
            if audience == COMMON {
                continue;
            }
            let own: HashSet<_> = events.iter().map(|e| e.id).collect();
            events.extend(common.iter().filter(|e| !own.contains(&e.id)).cloned());
        }

        // `sort_by` is stable: equal start times keep insertion order.
        for events in buckets.values_mut() {
            events.sort_by(|a, b| b.valid_since.cmp(&a.valid_since));
        }

        Ok(buckets)
    }

    /// Computes the buckets for the current time and writes both result
    /// files for every bucket.
    ///
    /// A write failure aborts the run; files written before it stay on disk.
    pub fn generate(&self) -> Result<()> {
        let buckets = self.buckets_at(OffsetDateTime::now_utc())?;

        for (audience, events) in &buckets {
            let pretty = self.output_dir.join(format!("results.{audience}.json"));
            let minified = self.output_dir.join(format!("results.{audience}.min.json"));
            write_json_pretty(&pretty, events)?;
            write_json_minified(&minified, events)?;
            tracing::info!(audience = %audience, events = events.len(), "wrote results");
        }

        tracing::info!(
            audiences = buckets.len(),
            dir = %self.output_dir.display(),
            "generated result files"
        );
        Ok(())
    }
}

/// Audience names end up in file names and must not leave the output dir.
fn check_audience(audience: &str) -> Result<()> {
    if audience.contains(['/', '\\']) {
        return Err(GeneratorError::InvalidAudience(audience.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use horde_core::json_io::read_json;
    use serde_json::Value;
    use std::fs;
    use time::format_description::well_known::Rfc3339;
    use time::macros::datetime;
    use time::Duration;
    use uuid::Uuid;

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

    fn event(title: &str, since: OffsetDateTime, limited_to: &[&str]) -> Event {
        let mut event = Event::new(title, since, since + Duration::days(30));
        event.limited_to = limited_to.iter().map(|s| s.to_string()).collect();
        event
    }

    fn titles(buckets: &Buckets, audience: &str) -> Vec<String> {
        buckets
            .get(audience)
            .unwrap_or_else(|| panic!("missing bucket {audience}"))
            .iter()
            .map(|e| e.title.clone())
            .collect()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("horde_generator_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn unique_ids_never_collide() {
        let events = vec![
            event("a", NOW - Duration::days(1), &[]),
            event("b", NOW - Duration::days(2), &["teamA"]),
        ];
        assert!(ResultGenerator::new(vec![], events).buckets_at(NOW).is_ok());
    }

    #[test]
    fn duplicate_id_fails_naming_the_id() {
        let first = event("a", NOW - Duration::days(1), &[]);
        let mut second = event("b", NOW + Duration::days(100), &["teamA"]);
        second.id = first.id;
        let id = first.id;

        let err = ResultGenerator::new(vec![], vec![first, second])
            .buckets_at(NOW)
            .unwrap_err();

        assert!(matches!(err, GeneratorError::DuplicateId(dup) if dup == id));
        assert_eq!(err.to_string(), format!("The ID '{id}' already exists"));
    }

    #[test]
    fn inactive_events_are_skipped_and_bounds_are_inclusive() {
        let starts_now = Event::new("starts-now", NOW, NOW + Duration::days(1));
        let ends_now = Event::new("ends-now", NOW - Duration::days(1), NOW);
        let future = Event::new("future", NOW + Duration::SECOND, NOW + Duration::days(1));
        let past = Event::new("past", NOW - Duration::days(1), NOW - Duration::SECOND);

        let events = vec![starts_now, ends_now, future, past];
        let buckets = ResultGenerator::new(vec!["teamA".into()], events)
            .buckets_at(NOW)
            .unwrap();

        assert_eq!(titles(&buckets, COMMON), vec!["starts-now", "ends-now"]);
        assert_eq!(titles(&buckets, "teamA"), vec!["starts-now", "ends-now"]);
    }

    #[test]
    fn windows_are_compared_in_utc() {
        // 14:00+02:00 is 12:00 UTC, i.e. exactly now.
        let offset = Event::new(
            "offset",
            datetime!(2024-06-01 14:00 +02:00),
            datetime!(2024-06-02 00:00 +02:00),
        );

        let buckets = ResultGenerator::new(vec![], vec![offset]).buckets_at(NOW).unwrap();

        let common = &buckets[COMMON];
        assert_eq!(common.len(), 1);
        assert_eq!(common[0].valid_since, NOW);
        assert_eq!(common[0].valid_since.offset(), UtcOffset::UTC);
    }

    #[test]
    fn static_clients_and_common_always_get_a_bucket() {
        let buckets = ResultGenerator::new(vec!["teamA".into(), "teamB".into()], vec![])
            .buckets_at(NOW)
            .unwrap();

        let audiences: Vec<_> = buckets.keys().cloned().collect();
        assert_eq!(audiences, vec![COMMON, "teamA", "teamB"]);
        assert!(buckets.values().all(Vec::is_empty));
    }

    #[test]
    fn unrestricted_events_default_to_common() {
        let buckets = ResultGenerator::new(vec![], vec![event("a", NOW, &[])])
            .buckets_at(NOW)
            .unwrap();

        assert_eq!(buckets[COMMON][0].limited_to, vec![COMMON]);
    }

    #[test]
    fn common_events_are_appended_after_own_events() {
        let since = NOW - Duration::hours(1);
        let events = vec![
            event("common-1", since, &[]),
            event("own-1", since, &["teamA"]),
            event("common-2", since, &[]),
            event("own-2", since, &["teamA"]),
        ];

        let buckets = ResultGenerator::new(vec!["teamB".into()], events)
            .buckets_at(NOW)
            .unwrap();

        assert_eq!(titles(&buckets, COMMON), vec!["common-1", "common-2"]);
        assert_eq!(
            titles(&buckets, "teamA"),
            vec!["own-1", "own-2", "common-1", "common-2"]
        );
        assert_eq!(titles(&buckets, "teamB"), vec!["common-1", "common-2"]);
    }

    #[test]
    fn common_event_appears_once_even_when_also_targeted() {
        let both = event("both", NOW, &[COMMON, "teamA", "teamA"]);

        let buckets = ResultGenerator::new(vec![], vec![both]).buckets_at(NOW).unwrap();

        assert_eq!(titles(&buckets, "teamA"), vec!["both"]);
        assert_eq!(titles(&buckets, COMMON), vec!["both"]);
    }

    #[test]
    fn buckets_are_sorted_by_start_descending() {
        let events = vec![
            event("oldest", NOW - Duration::days(3), &["teamA"]),
            event("newest", NOW - Duration::hours(1), &[]),
            event("middle", NOW - Duration::days(2), &["teamA"]),
        ];

        let buckets = ResultGenerator::new(vec![], events).buckets_at(NOW).unwrap();

        assert_eq!(titles(&buckets, "teamA"), vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn equal_start_times_keep_source_order() {
        let since = NOW - Duration::days(1);
        let events = vec![
            event("A", since, &["teamA"]),
            event("later", NOW, &["teamA"]),
            event("B", since, &["teamA"]),
        ];

        let buckets = ResultGenerator::new(vec![], events).buckets_at(NOW).unwrap();

        assert_eq!(titles(&buckets, "teamA"), vec!["later", "A", "B"]);
    }

    #[test]
    fn audience_names_must_be_usable_in_file_names() {
        for bad in ["../etc", "a\\b", "/"] {
            let err = ResultGenerator::new(vec![], vec![event("x", NOW, &[bad])])
                .buckets_at(NOW)
                .unwrap_err();
            assert!(matches!(err, GeneratorError::InvalidAudience(ref a) if a == bad));
        }

        let err = ResultGenerator::new(vec!["a/b".into()], vec![])
            .buckets_at(NOW)
            .unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidAudience(_)));
    }

    #[test]
    fn dotted_and_empty_audiences_stay_inside_output_dir() {
        let events = vec![event("x", NOW, &["", ".", ".."])];

        let buckets = ResultGenerator::new(vec![], events).buckets_at(NOW).unwrap();

        for audience in ["", ".", ".."] {
            assert_eq!(titles(&buckets, audience), vec!["x"]);
        }
    }

    #[test]
    fn generate_writes_pretty_and_minified_files() {
        let dir = temp_dir("generate");
        let now = OffsetDateTime::now_utc();
        let shared = Event::new("shared", now - Duration::days(1), now + Duration::days(1));
        let shared_id = shared.id;

        ResultGenerator::new(vec!["teamA".into(), "idle".into()], vec![shared])
            .with_output_dir(&dir)
            .generate()
            .unwrap();

        for audience in [COMMON, "teamA", "idle"] {
            let pretty: Value = read_json(&dir.join(format!("results.{audience}.json"))).unwrap();
            let minified: Value =
                read_json(&dir.join(format!("results.{audience}.min.json"))).unwrap();
            assert_eq!(pretty, minified, "bucket {audience}");
        }

        let team_a: Vec<Event> = read_json(&dir.join("results.teamA.json")).unwrap();
        assert_eq!(team_a.len(), 1);
        assert_eq!(team_a[0].id, shared_id);
        assert_eq!(team_a[0].limited_to, vec![COMMON]);

        let idle: Vec<Event> = read_json(&dir.join("results.idle.min.json")).unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id, shared_id);
        let pretty_raw = fs::read_to_string(dir.join("results.common.json")).unwrap();
        assert!(pretty_raw.starts_with("[\n  {\n"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn generate_without_active_events_writes_empty_arrays() {
        let dir = temp_dir("generate_empty");
        let now = OffsetDateTime::now_utc();
        let expired = Event::new("expired", now - Duration::days(2), now - Duration::days(1));

        ResultGenerator::new(vec!["idle".into()], vec![expired])
            .with_output_dir(&dir)
            .generate()
            .unwrap();

        for audience in [COMMON, "idle"] {
            let raw = fs::read_to_string(dir.join(format!("results.{audience}.min.json"))).unwrap();
            assert_eq!(raw, "[]", "bucket {audience}");
            let pretty: Value = read_json(&dir.join(format!("results.{audience}.json"))).unwrap();
            assert_eq!(pretty, Value::Array(vec![]));
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn null_limited_to_goes_to_common_and_static_clients() {
        let now = OffsetDateTime::now_utc();
        let raw = format!(
            r#"[{{
                "id": "6f1c1c38-4f0e-4a8e-9a55-0b8c1f0f6a01",
                "title": "Everyone",
                "validSince": "{}",
                "validUntil": "{}",
                "limitedTo": null
            }}]"#,
            (now - Duration::days(1)).format(&Rfc3339).unwrap(),
            (now + Duration::days(1)).format(&Rfc3339).unwrap(),
        );
        let events: Vec<Event> = serde_json::from_str(&raw).unwrap();

        let buckets = ResultGenerator::new(vec!["teamA".into()], events)
            .buckets_at(now)
            .unwrap();

        assert_eq!(titles(&buckets, COMMON), vec!["Everyone"]);
        assert_eq!(titles(&buckets, "teamA"), vec!["Everyone"]);
        assert_eq!(buckets["teamA"][0].limited_to, vec![COMMON]);
    }

    #[test]
    fn write_failure_keeps_earlier_buckets() {
        let dir = temp_dir("write_failure");
        let now = OffsetDateTime::now_utc();
        let shared = Event::new("shared", now - Duration::days(1), now + Duration::days(1));
        // A directory in place of the teamB file makes that write fail.
        fs::create_dir_all(dir.join("results.teamB.json")).unwrap();

        let res = ResultGenerator::new(vec!["teamA".into(), "teamB".into()], vec![shared])
            .with_output_dir(&dir)
            .generate();

        assert!(matches!(res, Err(GeneratorError::Store(_))));
        for name in [
            "results.common.json",
            "results.common.min.json",
            "results.teamA.json",
            "results.teamA.min.json",
        ] {
            assert!(dir.join(name).is_file(), "missing {name}");
        }
        assert!(!dir.join("results.teamB.min.json").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplicate_id_writes_no_files() {
        let dir = temp_dir("duplicate");
        let now = OffsetDateTime::now_utc();
        let first = Event::new("a", now - Duration::days(1), now + Duration::days(1));
        let mut second = first.clone();
        second.title = "b".into();

        let res = ResultGenerator::new(vec!["teamA".into()], vec![first, second])
            .with_output_dir(&dir)
            .generate();

        assert!(matches!(res, Err(GeneratorError::DuplicateId(_))));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_output_dir_is_a_store_error() {
        let dir = temp_dir("missing_out").join(Uuid::new_v4().to_string());

        let res = ResultGenerator::new(vec![], vec![])
            .with_output_dir(&dir)
            .generate();

        assert!(matches!(res, Err(GeneratorError::Store(_))));
    }
}
