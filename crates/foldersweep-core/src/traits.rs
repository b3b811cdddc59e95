//! Collaborator seams: the engine depends on these traits, the platform
//! crate provides the implementations.

use std::time::{Duration, Instant};

use crate::types::{DeletionOutcome, EngineStatus, ScheduleConfig};

/// Receives run outcomes and status refreshes (notification collaborator).
pub trait OutcomeSink: Send + Sync {
    /// Called once per completed run.
    fn publish_outcome(&self, outcome: &DeletionOutcome);

    /// Called whenever the status presentation should be regenerated.
    fn publish_status(&self, _status: &EngineStatus) {}
}

/// Provides the "keep the machine awake" resource held for a run.
pub trait WakeHoldProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Acquire a hold that is released when the returned guard drops.
    /// `max_hold` bounds the hold even if the guard is leaked or stuck.
    fn acquire(&self, reason: &str, max_hold: Duration) -> WakeHold;
}

/// Permission collaborator: has the user granted everything a run needs?
pub trait AccessGate: Send + Sync {
    /// Human-readable list of missing grants. Empty means all granted.
    fn missing_access(&self, schedule: &ScheduleConfig) -> Vec<String>;

    fn all_granted(&self, schedule: &ScheduleConfig) -> bool {
        self.missing_access(schedule).is_empty()
    }
}

/// Scoped wake-prevention hold. Released on drop, including during unwinding.
pub struct WakeHold {
    label: String,
    acquired_at: Instant,
    max_hold: Duration,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl WakeHold {
    pub fn new<F>(label: &str, max_hold: Duration, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            label: label.to_string(),
            acquired_at: Instant::now(),
            max_hold,
            release: Some(Box::new(release)),
        }
    }

    /// A hold with nothing to release (platforms without a sleep inhibitor).
    pub fn noop(label: &str, max_hold: Duration) -> Self {
        Self {
            label: label.to_string(),
            acquired_at: Instant::now(),
            max_hold,
            release: None,
        }
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    pub fn max_hold(&self) -> Duration {
        self.max_hold
    }
}

impl Drop for WakeHold {
    fn drop(&mut self) {
        let held = self.held_for();
        if held > self.max_hold {
            tracing::warn!(
                "⚠️ Wake hold '{}' held for {:?}, past its {:?} limit",
                self.label,
                held,
                self.max_hold
            );
        }
        if let Some(release) = self.release.take() {
            release();
        }
        tracing::debug!("🔓 Wake hold '{}' released after {:?}", self.label, held);
    }
}
