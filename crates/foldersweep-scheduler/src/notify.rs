//! Notification routing: turns run outcomes into user-facing notifications,
//! keeps a short history in the schedule store and fans out to every
//! registered sink.

use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};

use foldersweep_core::traits::OutcomeSink;
use foldersweep_core::{DeletionOutcome, EngineStatus};

use crate::store::ScheduleStore;

pub const HISTORY_LIMIT: usize = 100;

/// A notification to show the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub priority: NotifyPriority,
    /// Which component produced it.
    pub source: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Notification priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotifyPriority {
    Normal,
    High,
}

impl Notification {
    pub fn new(title: &str, body: &str, source: &str, priority: NotifyPriority) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            priority,
            source: source.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Completion notice for a finished run.
    pub fn from_outcome(outcome: &DeletionOutcome) -> Self {
        if outcome.is_success() {
            Self::new(
                "Folder deletion completed",
                &format!("Deleted {} folder(s)", outcome.succeeded.len()),
                "worker",
                NotifyPriority::Normal,
            )
        } else {
            let mut body = outcome.summary();
            if let Some(first) = outcome.failures.first() {
                body.push_str(&format!("\n{}: {}", first.path.display(), first.reason));
            }
            Self::new("Folder deletion failed", &body, "worker", NotifyPriority::High)
        }
    }
}

/// Something that can display a notification (desktop, log, ...).
pub trait NotifySink: Send + Sync {
    fn name(&self) -> &str;
    fn deliver(&self, notification: &Notification);
}

/// Sink that only writes to the tracing log.
pub struct LogSink;

impl NotifySink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, n: &Notification) {
        match n.priority {
            NotifyPriority::High => tracing::warn!("🔔 {}: {}", n.title, n.body),
            _ => tracing::info!("🔔 {}: {}", n.title, n.body),
        }
    }
}

/// Notification router: records every notification and hands it to all sinks.
/// The history is persisted so `foldersweep status` can show it from another
/// process.
pub struct NotifyRouter {
    sinks: Vec<Arc<dyn NotifySink>>,
    store: Arc<ScheduleStore>,
}

impl NotifyRouter {
    pub fn new(store: Arc<ScheduleStore>) -> Self {
        Self {
            sinks: Vec::new(),
            store,
        }
    }

    pub fn register_sink(&mut self, sink: Arc<dyn NotifySink>) {
        tracing::debug!("Notification sink registered: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Record and deliver.
    pub fn send(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.deliver(&notification);
        }
        self.record(notification);
    }

    fn record(&self, notification: Notification) {
        if let Err(e) = self.store.push_notification(&notification, HISTORY_LIMIT) {
            tracing::warn!("⚠️ Could not save notification history: {e}");
        }
    }

    /// Recorded notifications, oldest first.
    pub fn history(&self) -> Vec<Notification> {
        self.store.notifications().unwrap_or_else(|e| {
            tracing::warn!("⚠️ Could not load notification history: {e}");
            Vec::new()
        })
    }
}

impl OutcomeSink for NotifyRouter {
    fn publish_outcome(&self, outcome: &DeletionOutcome) {
        self.send(Notification::from_outcome(outcome));
    }

    fn publish_status(&self, status: &EngineStatus) {
        let state = if status.running { "active" } else { "stopped" };
        tracing::info!(
            "📋 Service {state}. Next deletion scheduled for {}",
            status
                .next_due_at
                .with_timezone(&Local)
                .format("%b %d, %Y at %H:%M")
        );
        if let Some(err) = &status.last_error {
            tracing::warn!("⚠️ Last error: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn store() -> Arc<ScheduleStore> {
        Arc::new(ScheduleStore::open_in_memory().unwrap())
    }

    #[derive(Default)]
    struct Capture(Mutex<Vec<Notification>>);

    impl NotifySink for Capture {
        fn name(&self) -> &str {
            "capture"
        }
        fn deliver(&self, n: &Notification) {
            self.0.lock().unwrap().push(n.clone());
        }
    }

    #[test]
    fn test_outcome_notification_priority() {
        let mut ok = DeletionOutcome::default();
        ok.attempted.insert("/tmp/a".into());
        ok.record_success("/tmp/a".into());
        let n = Notification::from_outcome(&ok);
        assert_eq!(n.priority, NotifyPriority::Normal);
        assert_eq!(n.title, "Folder deletion completed");

        let mut bad = ok.clone();
        bad.attempted.insert("/system".into());
        bad.record_protected("/system".into());
        let n = Notification::from_outcome(&bad);
        assert_eq!(n.priority, NotifyPriority::High);
        assert!(n.body.contains("1 protected"));
        assert!(n.body.contains("/system: protected path"));
    }

    #[test]
    fn test_router_fans_out_and_records() {
        let capture = Arc::new(Capture::default());
        let mut router = NotifyRouter::new(store());
        router.register_sink(Arc::new(LogSink));
        router.register_sink(capture.clone());
        assert_eq!(router.sink_names(), vec!["log", "capture"]);

        router.publish_outcome(&DeletionOutcome::default());
        assert_eq!(capture.0.lock().unwrap().len(), 1);
        assert_eq!(router.history().len(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let router = NotifyRouter::new(store());
        for i in 0..(HISTORY_LIMIT + 5) {
            router.send(Notification::new(
                &format!("n{i}"),
                "",
                "test",
                NotifyPriority::Normal,
            ));
        }
        let history = router.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].title, "n5");
        assert_eq!(history[HISTORY_LIMIT - 1].title, format!("n{}", HISTORY_LIMIT + 4));
    }

    #[test]
    fn test_history_visible_to_other_store_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.db");
        let router = NotifyRouter::new(Arc::new(ScheduleStore::open(&path).unwrap()));
        let mut failed = DeletionOutcome::default();
        failed.attempted.insert("/system".into());
        failed.record_protected("/system".into());
        router.publish_outcome(&failed);

        let reader = ScheduleStore::open(&path).unwrap();
        let history = reader.notifications().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].title, "Folder deletion failed");
        assert_eq!(history[0].priority, NotifyPriority::High);
    }
}
