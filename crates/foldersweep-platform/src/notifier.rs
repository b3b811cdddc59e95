//! Desktop notifications via `notify-send` (Linux) or `osascript` (macOS).

use std::path::PathBuf;
use std::process::{Command, Stdio};

use foldersweep_scheduler::{Notification, NotifyPriority, NotifySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyTool {
    NotifySend,
    Osascript,
}

pub struct DesktopNotifier {
    tool: NotifyTool,
    program: PathBuf,
}

impl DesktopNotifier {
    pub fn notify_send(program: PathBuf) -> Self {
        Self {
            tool: NotifyTool::NotifySend,
            program,
        }
    }

    pub fn osascript(program: PathBuf) -> Self {
        Self {
            tool: NotifyTool::Osascript,
            program,
        }
    }

    pub fn args(&self, n: &Notification) -> Vec<String> {
        match self.tool {
            NotifyTool::NotifySend => {
                let urgency = match n.priority {
                    NotifyPriority::High => "critical",
                    NotifyPriority::Normal => "normal",
                };
                vec![
                    "-u".into(),
                    urgency.into(),
                    "-a".into(),
                    "FolderSweep".into(),
                    n.title.clone(),
                    n.body.clone(),
                ]
            }
            NotifyTool::Osascript => vec![
                "-e".into(),
                format!(
                    "display notification \"{}\" with title \"FolderSweep\" subtitle \"{}\"",
                    applescript_escape(&n.body),
                    applescript_escape(&n.title)
                ),
            ],
        }
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', " ")
}

impl NotifySink for DesktopNotifier {
    fn name(&self) -> &str {
        match self.tool {
            NotifyTool::NotifySend => "notify-send",
            NotifyTool::Osascript => "osascript",
        }
    }

    fn deliver(&self, n: &Notification) {
        let result = Command::new(&self.program)
            .args(self.args(n))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!("⚠️ {} exited with {status}", self.name()),
            Err(e) => tracing::warn!("⚠️ Desktop notification failed: {e}"),
        }
    }
}
