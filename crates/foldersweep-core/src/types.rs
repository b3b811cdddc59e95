//! Schedule and outcome types shared by every FolderSweep crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::{Result, SweepError};

pub const DEFAULT_INTERVAL_DAYS: u32 = 3;
pub const DEFAULT_HOUR: u32 = 2;
pub const DEFAULT_MINUTE: u32 = 0;

/// Wall-clock target for the baseline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(SweepError::Config(format!(
                "Invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Parse `HH:MM`.
    pub fn parse(s: &str) -> Result<Self> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SweepError::Config(format!("Expected HH:MM, got '{s}'")))?;
        let hour = h
            .parse()
            .map_err(|_| SweepError::Config(format!("Invalid hour: '{h}'")))?;
        let minute = m
            .parse()
            .map_err(|_| SweepError::Config(format!("Invalid minute: '{m}'")))?;
        Self::new(hour, minute)
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self {
            hour: DEFAULT_HOUR,
            minute: DEFAULT_MINUTE,
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The persisted schedule. One instance per installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Days between runs (>= 1).
    pub interval_days: u32,
    pub time_of_day: TimeOfDay,
    /// Deletion targets. Ordered set so duplicates collapse.
    pub selected_paths: BTreeSet<PathBuf>,
    /// Whether the worker should be (re)armed.
    pub enabled: bool,
    /// Completion time of the most recent run.
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_days: DEFAULT_INTERVAL_DAYS,
            time_of_day: TimeOfDay::default(),
            selected_paths: BTreeSet::new(),
            enabled: false,
            last_run_at: None,
        }
    }
}

/// Why a single selected path failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one deletion run across all selected paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub attempted: BTreeSet<PathBuf>,
    pub succeeded: BTreeSet<PathBuf>,
    pub failed: BTreeSet<PathBuf>,
    pub skipped_protected: BTreeSet<PathBuf>,
    #[serde(default)]
    pub failures: Vec<PathFailure>,
}

impl DeletionOutcome {
    /// True iff nothing failed and nothing was skipped as protected.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped_protected.is_empty()
    }

    pub fn record_success(&mut self, path: PathBuf) {
        self.succeeded.insert(path);
    }

    pub fn record_failure(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.failures.push(PathFailure {
            path: path.clone(),
            reason: reason.into(),
        });
        self.failed.insert(path);
    }

    pub fn record_protected(&mut self, path: PathBuf) {
        self.failures.push(PathFailure {
            path: path.clone(),
            reason: "protected path".into(),
        });
        self.skipped_protected.insert(path);
    }

    /// One-line summary for logs and notifications.
    pub fn summary(&self) -> String {
        format!(
            "{} attempted, {} deleted, {} failed, {} protected",
            self.attempted.len(),
            self.succeeded.len(),
            self.failed.len(),
            self.skipped_protected.len()
        )
    }
}

/// Snapshot exposed to status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Whether the worker is active (armed and resident).
    pub running: bool,
    pub next_due_at: DateTime<Utc>,
    pub last_outcome: Option<DeletionOutcome>,
    /// Most recent scheduling or store error, cleared on the next success.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_parse() {
        assert_eq!(TimeOfDay::parse("02:30").unwrap(), TimeOfDay { hour: 2, minute: 30 });
        assert_eq!(TimeOfDay::parse(" 23:59 ").unwrap().to_string(), "23:59");
        assert!(TimeOfDay::parse("24:00").is_err());
        assert!(TimeOfDay::parse("12:60").is_err());
        assert!(TimeOfDay::parse("noon").is_err());
    }

    #[test]
    fn test_schedule_defaults() {
        let cfg = ScheduleConfig::default();
        assert_eq!(cfg.interval_days, 3);
        assert_eq!(cfg.time_of_day.to_string(), "02:00");
        assert!(!cfg.enabled);
        assert!(cfg.last_run_at.is_none());
    }

    #[test]
    fn test_outcome_success_rules() {
        let mut outcome = DeletionOutcome::default();
        outcome.attempted.insert("/tmp/a".into());
        outcome.record_success("/tmp/a".into());
        assert!(outcome.is_success());

        outcome.attempted.insert("/system".into());
        outcome.record_protected("/system".into());
        assert!(!outcome.is_success());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.summary(), "2 attempted, 1 deleted, 0 failed, 1 protected");
    }

    #[test]
    fn test_outcome_json_roundtrip_keeps_sets() {
        let mut outcome = DeletionOutcome::default();
        outcome.attempted.insert("/tmp/x".into());
        outcome.record_failure("/tmp/x".into(), "permission denied");
        let json = serde_json::to_string(&outcome).unwrap();
        let back: DeletionOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
