//! Persisted skip / remind-later decisions, one record per application
//! namespace.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use appcast_platform::AppPaths;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::identity::Namespace;
use crate::version::Version;

/// The user's standing decisions about updates for one application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionState {
    pub skipped_version: Option<Version>,
    pub skip: bool,
    pub remind_after: Option<DateTime<Utc>>,
}

impl DecisionState {
    /// The remind-later deadline, if it is still in the future.
    #[must_use]
    pub fn pending_reminder(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.remind_after.filter(|deadline| *deadline > now)
    }

    /// The version an active skip covers, if any.
    #[must_use]
    pub fn active_skip(&self) -> Option<Version> {
        if self.skip { self.skipped_version } else { None }
    }
}

/// Key/value storage for [`DecisionState`], scoped by application namespace.
///
/// Each write touches a single logical field group; no multi-write
/// transactions are offered.
pub trait DecisionStore: Send + Sync {
    /// Read the state for `namespace`; missing fields read as "no skip, no
    /// reminder".
    ///
    /// # Errors
    /// Returns an error when the backing medium cannot be read.
    fn read_state(&self, namespace: &Namespace) -> Result<DecisionState, StoreError>;

    /// Record that the user skipped `version`.
    ///
    /// # Errors
    /// Returns an error when the backing medium cannot be written.
    fn write_skip(&self, namespace: &Namespace, version: &Version) -> Result<(), StoreError>;

    /// Lift a stale skip, remembering `version` as the last one seen.
    ///
    /// # Errors
    /// Returns an error when the backing medium cannot be written.
    fn clear_skip(&self, namespace: &Namespace, version: &Version) -> Result<(), StoreError>;

    /// Replace the remind-later deadline. A reminder also lifts any skip.
    ///
    /// # Errors
    /// Returns an error when the backing medium cannot be written.
    fn write_remind_after(
        &self,
        namespace: &Namespace,
        remind_after: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// In-process store, for embedding hosts that persist elsewhere and for tests.
#[derive(Debug, Default)]
pub struct MemoryDecisionStore {
    states: Mutex<HashMap<Namespace, DecisionState>>,
}

impl MemoryDecisionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, namespace: &Namespace, apply: impl FnOnce(&mut DecisionState)) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        apply(states.entry(namespace.clone()).or_default());
    }
}

impl DecisionStore for MemoryDecisionStore {
    fn read_state(&self, namespace: &Namespace) -> Result<DecisionState, StoreError> {
        let states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(states.get(namespace).cloned().unwrap_or_default())
    }

    fn write_skip(&self, namespace: &Namespace, version: &Version) -> Result<(), StoreError> {
        self.update(namespace, |state| {
            state.skip = true;
            state.skipped_version = Some(*version);
        });
        Ok(())
    }

    fn clear_skip(&self, namespace: &Namespace, version: &Version) -> Result<(), StoreError> {
        self.update(namespace, |state| {
            state.skip = false;
            state.skipped_version = Some(*version);
        });
        Ok(())
    }

    fn write_remind_after(
        &self,
        namespace: &Namespace,
        remind_after: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(namespace, |state| {
            state.skip = false;
            state.remind_after = Some(remind_after);
        });
        Ok(())
    }
}

/// On-disk shape of a decision record. Values are kept loosely typed so a
/// damaged field only loses itself, never the whole record.
///
/// `remind_after` is written as Unix milliseconds, which covers every
/// `DateTime<Utc>`; RFC 3339 strings from older records are still read.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredDecision {
    version: Option<String>,
    skip: bool,
    remind_after: Option<serde_json::Value>,
}

fn decode_deadline(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::Number(millis) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        serde_json::Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|deadline| deadline.with_timezone(&Utc)),
        _ => None,
    }
}

impl StoredDecision {
    fn into_state(self, namespace: &Namespace) -> DecisionState {
        let skipped_version = self.version.and_then(|raw| match raw.parse::<Version>() {
            Ok(version) => Some(version),
            Err(error) => {
                warn!("Ignoring stored skipped version {raw:?} for {namespace}: {error}");
                None
            }
        });
        let remind_after = self.remind_after.and_then(|raw| {
            let deadline = decode_deadline(&raw);
            if deadline.is_none() {
                warn!("Ignoring stored reminder {raw} for {namespace}");
            }
            deadline
        });

        DecisionState {
            // A skip without a readable version has nothing to compare against.
            skip: self.skip && skipped_version.is_some(),
            skipped_version,
            remind_after,
        }
    }
}

/// One JSON document per namespace under the appcast data directory.
#[derive(Debug, Clone)]
pub struct JsonFileDecisionStore {
    paths: AppPaths,
}

impl JsonFileDecisionStore {
    #[must_use]
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    /// Store rooted in the current user's appcast data directory.
    ///
    /// # Errors
    /// Returns an error when the platform directories cannot be resolved.
    pub fn for_current_user() -> Result<Self, StoreError> {
        Ok(Self::new(AppPaths::new()?))
    }

    #[must_use]
    pub fn state_file(&self, namespace: &Namespace) -> PathBuf {
        self.paths.decision_state_file(namespace.as_path())
    }

    fn read_record(&self, namespace: &Namespace) -> Result<StoredDecision, StoreError> {
        let path = self.state_file(namespace);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredDecision::default());
            }
            Err(error) => {
                return Err(StoreError::io("failed to read decision state", error));
            }
        };

        Ok(serde_json::from_str(&content).unwrap_or_else(|error| {
            warn!(
                "Decision state at {} is unreadable, starting fresh: {error}",
                path.display()
            );
            StoredDecision::default()
        }))
    }

    fn update(
        &self,
        namespace: &Namespace,
        apply: impl FnOnce(&mut StoredDecision),
    ) -> Result<(), StoreError> {
        let mut record = self.read_record(namespace)?;
        apply(&mut record);

        let path = self.state_file(namespace);
        let dir = path.parent().ok_or_else(|| {
            StoreError::io(
                "decision state path has no parent",
                std::io::Error::other(path.display().to_string()),
            )
        })?;
        std::fs::create_dir_all(dir)
            .map_err(|error| StoreError::io("failed to create state directory", error))?;

        let content = serde_json::to_vec_pretty(&record).map_err(StoreError::Serialize)?;
        let mut staged = tempfile::NamedTempFile::new_in(dir)
            .map_err(|error| StoreError::io("failed to stage decision state", error))?;
        staged
            .write_all(&content)
            .map_err(|error| StoreError::io("failed to write decision state", error))?;
        staged
            .persist(&path)
            .map_err(|error| StoreError::io("failed to replace decision state", error.error))?;
        Ok(())
    }
}

impl DecisionStore for JsonFileDecisionStore {
    fn read_state(&self, namespace: &Namespace) -> Result<DecisionState, StoreError> {
        Ok(self.read_record(namespace)?.into_state(namespace))
    }

    fn write_skip(&self, namespace: &Namespace, version: &Version) -> Result<(), StoreError> {
        self.update(namespace, |record| {
            record.skip = true;
            record.version = Some(version.to_string());
        })
    }

    fn clear_skip(&self, namespace: &Namespace, version: &Version) -> Result<(), StoreError> {
        self.update(namespace, |record| {
            record.skip = false;
            record.version = Some(version.to_string());
        })
    }

    fn write_remind_after(
        &self,
        namespace: &Namespace,
        remind_after: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(namespace, |record| {
            record.skip = false;
            record.remind_after = Some(remind_after.timestamp_millis().into());
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::identity::AppIdentity;

    fn widget() -> Namespace {
        AppIdentity::new(Some("Acme"), "Widget").namespace()
    }

    fn gadget() -> Namespace {
        AppIdentity::new(Some("Acme"), "Gadget").namespace()
    }

    fn v(s: &str) -> Version {
        s.parse().expect("test version should parse")
    }

    fn file_store() -> (tempfile::TempDir, JsonFileDecisionStore) {
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = JsonFileDecisionStore::new(AppPaths::under(dir.path()));
        (dir, store)
    }

    fn exercise_contract(store: &dyn DecisionStore) {
        let deadline = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(
            store.read_state(&widget()).expect("read"),
            DecisionState::default()
        );

        store.write_skip(&widget(), &v("1.5")).expect("write skip");
        let state = store.read_state(&widget()).expect("read");
        assert!(state.skip);
        assert_eq!(state.skipped_version, Some(v("1.5")));
        assert_eq!(state.active_skip(), Some(v("1.5")));

        store.clear_skip(&widget(), &v("1.6")).expect("clear skip");
        let state = store.read_state(&widget()).expect("read");
        assert!(!state.skip);
        assert_eq!(state.skipped_version, Some(v("1.6")));
        assert_eq!(state.active_skip(), None);

        store
            .write_remind_after(&widget(), deadline)
            .expect("write reminder");
        store
            .write_remind_after(&widget(), deadline + Duration::hours(1))
            .expect("overwrite reminder");
        let state = store.read_state(&widget()).expect("read");
        assert_eq!(state.remind_after, Some(deadline + Duration::hours(1)));

        assert_eq!(
            store.read_state(&gadget()).expect("read"),
            DecisionState::default()
        );
    }

    #[test]
    fn memory_store_honours_contract() {
        exercise_contract(&MemoryDecisionStore::new());
    }

    #[test]
    fn file_store_honours_contract() {
        let (_dir, store) = file_store();
        exercise_contract(&store);
    }

    #[test]
    fn reminder_lifts_an_active_skip() {
        let store = MemoryDecisionStore::new();
        store.write_skip(&widget(), &v("2.0")).expect("write skip");
        store
            .write_remind_after(&widget(), Utc::now())
            .expect("write reminder");

        let state = store.read_state(&widget()).expect("read");
        assert!(!state.skip);
        assert_eq!(state.skipped_version, Some(v("2.0")));
    }

    #[test]
    fn pending_reminder_only_reports_future_deadlines() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let state = DecisionState {
            remind_after: Some(now + Duration::hours(1)),
            ..DecisionState::default()
        };
        assert_eq!(state.pending_reminder(now), Some(now + Duration::hours(1)));
        assert_eq!(state.pending_reminder(now + Duration::hours(1)), None);
        assert_eq!(state.pending_reminder(now + Duration::hours(2)), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let (dir, store) = file_store();
        store.write_skip(&widget(), &v("3.1")).expect("write skip");

        let reopened = JsonFileDecisionStore::new(AppPaths::under(dir.path()));
        assert_eq!(
            reopened.read_state(&widget()).expect("read").active_skip(),
            Some(v("3.1"))
        );
    }

    #[test]
    fn corrupted_version_fails_open() {
        let (_dir, store) = file_store();
        let path = store.state_file(&widget());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        std::fs::write(
            &path,
            r#"{"version":"not-a-version","skip":true,"remind_after":"yesterday"}"#,
        )
        .expect("write corrupted state");

        let state = store.read_state(&widget()).expect("read should still succeed");
        assert_eq!(state, DecisionState::default());
    }

    #[test]
    fn far_future_reminders_survive_a_reload() {
        let (_dir, store) = file_store();
        let now = Utc::now();

        for deadline in [now + Duration::days(3_000_000), DateTime::<Utc>::MAX_UTC] {
            store
                .write_remind_after(&widget(), deadline)
                .expect("write reminder");

            let stored = store
                .read_state(&widget())
                .expect("read")
                .remind_after
                .expect("deadline should read back");
            assert_eq!(stored.timestamp_millis(), deadline.timestamp_millis());
            assert!(
                store
                    .read_state(&widget())
                    .expect("read")
                    .pending_reminder(now)
                    .is_some()
            );
        }
    }

    #[test]
    fn rfc3339_reminders_from_older_records_are_read() {
        let (_dir, store) = file_store();
        let path = store.state_file(&widget());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        std::fs::write(&path, r#"{"remind_after":"2030-01-02T03:04:05+00:00"}"#)
            .expect("write state");

        assert_eq!(
            store.read_state(&widget()).expect("read").remind_after,
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap())
        );
    }

    #[test]
    fn corrupted_document_reads_as_empty_and_is_repaired_on_write() {
        let (_dir, store) = file_store();
        let path = store.state_file(&widget());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        std::fs::write(&path, "{ definitely not json").expect("write corrupted state");

        assert_eq!(
            store.read_state(&widget()).expect("read"),
            DecisionState::default()
        );

        store.write_skip(&widget(), &v("1.0")).expect("write skip");
        let content = std::fs::read_to_string(&path).expect("state file should exist");
        let value: serde_json::Value =
            serde_json::from_str(&content).expect("state file should be valid JSON again");
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["skip"], true);
    }
}
