//! FolderSweep daemon configuration.
//!
//! The schedule itself (interval, time of day, folders, enabled flag) lives in
//! the schedule store. This file only tunes how the daemon runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SweepError};

/// Root configuration (`~/.foldersweep/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Directory holding `schedule.db`. Always protected from deletion.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Cadence of the self-check that verifies the armed wake-up.
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
    /// Upper bound on how long a run may hold the wake-prevention resource.
    #[serde(default = "default_max_wake_hold")]
    pub max_wake_hold_secs: u64,
    /// How far past its deadline an armed wake-up may be before the
    /// self-check treats it as lost and re-arms it.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance_secs: u64,
    /// Delay before the supervisor restarts a crashed worker loop.
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_secs: u64,
    #[serde(default)]
    pub protection: ProtectionConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_data_dir() -> String { "~/.foldersweep".into() }
fn default_health_check_interval() -> u64 { 3600 }
fn default_max_wake_hold() -> u64 { 600 }
fn default_drift_tolerance() -> u64 { 120 }
fn default_restart_backoff() -> u64 { 5 }
fn bool_true() -> bool { true }

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            health_check_interval_secs: default_health_check_interval(),
            max_wake_hold_secs: default_max_wake_hold(),
            drift_tolerance_secs: default_drift_tolerance(),
            restart_backoff_secs: default_restart_backoff(),
            protection: ProtectionConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Load config from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SweepError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SweepError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SweepError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.health_check_interval_secs == 0 {
            return Err(SweepError::Config(
                "health_check_interval_secs must be at least 1".into(),
            ));
        }
        if self.max_wake_hold_secs == 0 {
            return Err(SweepError::Config("max_wake_hold_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FolderSweep home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".foldersweep")
    }

    /// `data_dir` with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    /// Location of the schedule database.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join("schedule.db")
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn max_wake_hold(&self) -> Duration {
        Duration::from_secs(self.max_wake_hold_secs)
    }

    pub fn drift_tolerance(&self) -> Duration {
        Duration::from_secs(self.drift_tolerance_secs)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_secs(self.restart_backoff_secs)
    }
}

/// Extra protected locations on top of the built-in system list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProtectionConfig {
    #[serde(default)]
    pub extra_paths: Vec<String>,
}

impl ProtectionConfig {
    /// Extra paths with `~` expanded.
    pub fn expanded_paths(&self) -> Vec<PathBuf> {
        self.extra_paths
            .iter()
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
            .collect()
    }
}

/// Outcome notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Deliver desktop notifications when the platform supports them.
    #[serde(default = "bool_true")]
    pub desktop: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { desktop: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.health_check_interval_secs, 3600);
        assert_eq!(config.max_wake_hold_secs, 600);
        assert!(config.notify.desktop);
        assert!(config.protection.extra_paths.is_empty());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            data_dir = "/var/lib/foldersweep"
            health_check_interval_secs = 900

            [protection]
            extra_paths = ["/srv/keep", "~/Documents"]

            [notify]
            desktop = false
        "#;

        let config: SweepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/var/lib/foldersweep/schedule.db"));
        assert_eq!(config.health_check_interval(), Duration::from_secs(900));
        assert_eq!(config.protection.extra_paths.len(), 2);
        assert!(!config.protection.expanded_paths()[1].starts_with("~"));
        assert!(!config.notify.desktop);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: SweepConfig = toml::from_str("").unwrap();
        assert_eq!(config.drift_tolerance_secs, 120);
        assert_eq!(config.restart_backoff_secs, 5);
    }

    #[test]
    fn test_load_rejects_zero_health_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "health_check_interval_secs = 0").unwrap();
        assert!(matches!(SweepConfig::load_from(&path), Err(SweepError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = SweepConfig::default();
        config.max_wake_hold_secs = 42;
        config.save_to(&path).unwrap();
        let loaded = SweepConfig::load_from(&path).unwrap();
        assert_eq!(loaded.max_wake_hold_secs, 42);
    }

    #[test]
    fn test_home_dir() {
        let home = SweepConfig::home_dir();
        assert!(home.to_string_lossy().contains("foldersweep"));
    }
}
