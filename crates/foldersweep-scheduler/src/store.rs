//! SQLite-backed schedule store.
//! One row per field under the `schedule` table, keyed by name.
//! Every write is committed with `synchronous=FULL` before returning.

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use foldersweep_core::types::{DEFAULT_HOUR, DEFAULT_INTERVAL_DAYS, DEFAULT_MINUTE};
use foldersweep_core::{DeletionOutcome, Result, ScheduleConfig, SweepError, TimeOfDay};

use crate::notify::Notification;

const KEY_INTERVAL: &str = "deletion_interval";
const KEY_HOUR: &str = "deletion_hour";
const KEY_MINUTE: &str = "deletion_minute";
const KEY_SELECTED: &str = "selected_folders";
const KEY_ENABLED: &str = "service_enabled";
const KEY_LAST_RUN: &str = "last_deletion";
const KEY_LAST_OUTCOME: &str = "last_outcome";
const KEY_SEEN_VERSION: &str = "seen_version";
const KEY_NOTIFICATIONS: &str = "notification_history";

/// Durable schedule state. Writers are serialized by the connection mutex.
pub struct ScheduleStore {
    conn: Mutex<rusqlite::Connection>,
}

impl ScheduleStore {
    /// Open or create the schedule database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| SweepError::Store(format!("DB open: {e}")))?;
        Self::init(conn)
    }

    /// In-memory store (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| SweepError::Store(format!("DB open: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(|e| SweepError::Store(format!("Pragma: {e}")))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schedule (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| SweepError::Store(format!("Migration: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|_| SweepError::Store("connection mutex poisoned".into()))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO schedule (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| SweepError::Store(format!("Write {key}: {e}")))?;
        tracing::debug!("💾 {key} = {value}");
        Ok(())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM schedule WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SweepError::Store(format!("Read {key}: {e}")))
    }

    fn load_all(&self) -> Result<HashMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM schedule")
            .map_err(|e| SweepError::Store(format!("Load: {e}")))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| SweepError::Store(format!("Load: {e}")))?;
        let values = rows
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(|e| SweepError::Store(format!("Load: {e}")))?;
        Ok(values)
    }

    /// Read the full schedule. Missing or unreadable keys take their defaults.
    pub fn get(&self) -> Result<ScheduleConfig> {
        let values = self.load_all()?;

        let interval_days = parse_or(&values, KEY_INTERVAL, DEFAULT_INTERVAL_DAYS).max(1);
        let hour = parse_or(&values, KEY_HOUR, DEFAULT_HOUR);
        let minute = parse_or(&values, KEY_MINUTE, DEFAULT_MINUTE);
        let time_of_day = TimeOfDay::new(hour, minute).unwrap_or_else(|e| {
            tracing::warn!("⚠️ Stored time of day unusable ({e}), using default");
            TimeOfDay::default()
        });

        let selected_paths = match values.get(KEY_SELECTED) {
            Some(json) => serde_json::from_str::<BTreeSet<PathBuf>>(json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse {KEY_SELECTED}: {e}");
                BTreeSet::new()
            }),
            None => BTreeSet::new(),
        };

        let enabled = values.get(KEY_ENABLED).is_some_and(|v| v == "1");

        let last_run_at = values
            .get(KEY_LAST_RUN)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|ms| *ms > 0)
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        Ok(ScheduleConfig {
            interval_days,
            time_of_day,
            selected_paths,
            enabled,
            last_run_at,
        })
    }

    pub fn set_interval(&self, days: u32) -> Result<()> {
        if days == 0 {
            return Err(SweepError::Config("Interval must be at least 1 day".into()));
        }
        self.put(KEY_INTERVAL, &days.to_string())
    }

    pub fn set_time_of_day(&self, hour: u32, minute: u32) -> Result<()> {
        let tod = TimeOfDay::new(hour, minute)?;
        self.put(KEY_HOUR, &tod.hour.to_string())?;
        self.put(KEY_MINUTE, &tod.minute.to_string())
    }

    /// Replace the selected folders. Duplicates collapse; relative paths are rejected.
    pub fn set_selected_paths<I>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let set: BTreeSet<PathBuf> = paths.into_iter().collect();
        if let Some(bad) = set.iter().find(|p| !p.is_absolute()) {
            return Err(SweepError::Config(format!(
                "Selected folder must be an absolute path: {}",
                bad.display()
            )));
        }
        let json = serde_json::to_string(&set)
            .map_err(|e| SweepError::Store(format!("Serialize paths: {e}")))?;
        self.put(KEY_SELECTED, &json)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.put(KEY_ENABLED, if enabled { "1" } else { "0" })
    }

    /// Record completion of a run. Only `last_run_at` changes.
    pub fn record_run(&self, at: DateTime<Utc>) -> Result<()> {
        self.put(KEY_LAST_RUN, &at.timestamp_millis().to_string())
    }

    pub fn record_outcome(&self, outcome: &DeletionOutcome) -> Result<()> {
        let json = serde_json::to_string(outcome)
            .map_err(|e| SweepError::Store(format!("Serialize outcome: {e}")))?;
        self.put(KEY_LAST_OUTCOME, &json)
    }

    pub fn last_outcome(&self) -> Result<Option<DeletionOutcome>> {
        Ok(self
            .get_value(KEY_LAST_OUTCOME)?
            .and_then(|json| serde_json::from_str(&json).ok()))
    }

    /// Package version seen by the previous daemon start, if any.
    pub fn seen_version(&self) -> Result<Option<String>> {
        self.get_value(KEY_SEEN_VERSION)
    }

    pub fn record_version(&self, version: &str) -> Result<()> {
        self.put(KEY_SEEN_VERSION, version)
    }

    /// Append to the notification history, keeping the newest `limit`.
    pub fn push_notification(&self, notification: &Notification, limit: usize) -> Result<()> {
        let mut history = self.notifications()?;
        history.push(notification.clone());
        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
        let json = serde_json::to_string(&history)
            .map_err(|e| SweepError::Store(format!("Serialize notifications: {e}")))?;
        self.put(KEY_NOTIFICATIONS, &json)
    }

    /// Notification history, oldest first. Unreadable history reads as empty.
    pub fn notifications(&self) -> Result<Vec<Notification>> {
        Ok(self
            .get_value(KEY_NOTIFICATIONS)?
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default())
    }

    /// Make every write fail, as a full disk or revoked access would.
    #[cfg(test)]
    pub(crate) fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.lock()?
            .pragma_update(None, "query_only", read_only)
            .map_err(|e| SweepError::Store(format!("Pragma: {e}")))
    }
}

fn parse_or<T: std::str::FromStr>(values: &HashMap<String, String>, key: &str, default: T) -> T {
    match values.get(key) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!("⚠️ Ignoring unreadable {key}='{v}'");
            default
        }),
        None => default,
    }
}
