//! Sleep inhibitors.
//!
//! A hold is a child process that blocks idle sleep for as long as it lives
//! (`systemd-inhibit ... sleep N` on Linux, `caffeinate -i -t N` on macOS).
//! The child is killed when the hold drops and exits on its own after
//! `max_hold`, so a stuck run cannot keep the machine awake forever.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use foldersweep_core::traits::{WakeHold, WakeHoldProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InhibitTool {
    SystemdInhibit,
    Caffeinate,
}

/// Wake hold backed by an external inhibitor command.
#[derive(Debug, Clone)]
pub struct CommandHoldProvider {
    tool: InhibitTool,
    program: PathBuf,
}

impl CommandHoldProvider {
    pub fn systemd_inhibit(program: PathBuf) -> Self {
        Self {
            tool: InhibitTool::SystemdInhibit,
            program,
        }
    }

    pub fn caffeinate(program: PathBuf) -> Self {
        Self {
            tool: InhibitTool::Caffeinate,
            program,
        }
    }

    pub fn tool(&self) -> InhibitTool {
        self.tool
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for a hold of `max_hold`, at least one second.
    pub fn args(&self, reason: &str, max_hold: Duration) -> Vec<String> {
        let secs = max_hold.as_secs().max(1).to_string();
        match self.tool {
            InhibitTool::SystemdInhibit => vec![
                "--what=sleep:idle".into(),
                "--who=foldersweep".into(),
                format!("--why={reason}"),
                "--mode=block".into(),
                "sleep".into(),
                secs,
            ],
            InhibitTool::Caffeinate => vec!["-i".into(), "-t".into(), secs],
        }
    }
}

impl WakeHoldProvider for CommandHoldProvider {
    fn name(&self) -> &'static str {
        match self.tool {
            InhibitTool::SystemdInhibit => "systemd-inhibit",
            InhibitTool::Caffeinate => "caffeinate",
        }
    }

    fn acquire(&self, reason: &str, max_hold: Duration) -> WakeHold {
        let spawned = Command::new(&self.program)
            .args(self.args(reason, max_hold))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                tracing::debug!("🔒 {} hold acquired (pid={})", self.name(), child.id());
                WakeHold::new(reason, max_hold, move || {
                    if let Err(e) = child.kill() {
                        tracing::debug!("Inhibitor already exited: {e}");
                    }
                    let _ = child.wait();
                })
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Could not start {}: {e}, running without a wake hold",
                    self.name()
                );
                WakeHold::noop(reason, max_hold)
            }
        }
    }
}

/// For hosts with no sleep inhibitor.
pub struct NoopHoldProvider;

impl WakeHoldProvider for NoopHoldProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    fn acquire(&self, reason: &str, max_hold: Duration) -> WakeHold {
        WakeHold::noop(reason, max_hold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemd_inhibit_args() {
        let p = CommandHoldProvider::systemd_inhibit("/usr/bin/systemd-inhibit".into());
        let args = p.args("folder deletion", Duration::from_secs(600));
        assert_eq!(args[0], "--what=sleep:idle");
        assert!(args.contains(&"--why=folder deletion".to_string()));
        assert_eq!(&args[args.len() - 2..], ["sleep", "600"]);
    }

    #[test]
    fn test_caffeinate_args_round_up_to_one_second() {
        let p = CommandHoldProvider::caffeinate("/usr/bin/caffeinate".into());
        assert_eq!(p.args("x", Duration::from_millis(10)), vec!["-i", "-t", "1"]);
        assert_eq!(p.name(), "caffeinate");
    }

    #[test]
    fn test_missing_program_falls_back_to_noop() {
        let p = CommandHoldProvider::caffeinate("/nonexistent/caffeinate".into());
        let hold = p.acquire("test", Duration::from_secs(5));
        assert_eq!(hold.max_hold(), Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_hold_child_is_reaped_on_drop() {
        // `sleep` stands in for an inhibitor that takes trailing args.
        let Ok(sleep) = which::which("sleep") else {
            return;
        };
        let p = CommandHoldProvider {
            tool: InhibitTool::Caffeinate,
            program: sleep,
        };
        // Runs `sleep -i -t 30`, which exits immediately with a usage error
        // on most systems; either way drop must not hang.
        let hold = p.acquire("test", Duration::from_secs(30));
        drop(hold);
    }

    #[test]
    fn test_noop_provider() {
        let hold = NoopHoldProvider.acquire("idle", Duration::from_secs(1));
        assert!(hold.held_for() < Duration::from_secs(1));
        assert_eq!(NoopHoldProvider.name(), "none");
    }
}
