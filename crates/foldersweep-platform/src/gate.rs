//! Filesystem access gate: can the daemon write its own state and reach
//! every selected folder?

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use foldersweep_core::ScheduleConfig;
use foldersweep_core::traits::AccessGate;

const PROBE_FILE: &str = ".access-probe";

pub struct FsAccessGate {
    data_dir: PathBuf,
}

impl FsAccessGate {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn data_dir_writable(&self) -> bool {
        if std::fs::create_dir_all(&self.data_dir).is_err() {
            return false;
        }
        let probe = self.data_dir.join(PROBE_FILE);
        match std::fs::write(&probe, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        }
    }

    fn check_target(path: &Path, missing: &mut Vec<String>) {
        match std::fs::read_dir(path) {
            Ok(_) => {}
            // Nothing to delete yet; runs treat it as success.
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                missing.push(format!("read access to {}", path.display()));
                return;
            }
            // Not a directory etc. is reported per run, not here.
            Err(_) => return,
        }

        if let Some(parent) = path.parent()
            && let Ok(meta) = std::fs::metadata(parent)
            && meta.permissions().readonly()
        {
            missing.push(format!("write access to {}", parent.display()));
        }
    }
}

impl AccessGate for FsAccessGate {
    fn missing_access(&self, schedule: &ScheduleConfig) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.data_dir_writable() {
            missing.push(format!("write access to {}", self.data_dir.display()));
        }
        for path in &schedule.selected_paths {
            Self::check_target(path, &mut missing);
        }
        if !missing.is_empty() {
            tracing::warn!("🔐 Missing access: {}", missing.join(", "));
        }
        missing
    }
}
