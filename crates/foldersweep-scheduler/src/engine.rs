//! Deletion worker: the background job that performs a run when woken,
//! records it, re-arms the next wake-up and self-checks its own timer.
//!
//! At most one run executes at a time. The single-run guard is taken
//! synchronously by the caller, before any blocking work is handed off, so
//! two triggers arriving back to back can never both start a run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, SubsecRound, Utc};
use tokio::task::JoinHandle;

use foldersweep_core::traits::{OutcomeSink, WakeHoldProvider};
use foldersweep_core::{DeletionOutcome, EngineStatus, Result, SweepConfig};
use foldersweep_security::DeletionGuard;

use crate::due;
use crate::store::ScheduleStore;
use crate::wake::WakeScheduler;

/// Tuning knobs taken from `SweepConfig`.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub max_wake_hold: Duration,
    pub drift_tolerance: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            max_wake_hold: config.max_wake_hold(),
            drift_tolerance: config.drift_tolerance(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&SweepConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Active, waiting for the next wake-up.
    Idle,
    /// A run is in progress.
    Running,
    /// Not active. Wake-ups are ignored.
    Stopped,
}

/// What the self-check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthAction {
    /// Worker stopped or mid-run, nothing checked.
    Skipped,
    /// The armed wake-up matches the schedule.
    Healthy,
    /// The wake-up was re-armed for the given reason.
    Rearmed(&'static str),
}

/// Proof that the caller owns the single run slot. Frees it on drop.
pub struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct WorkerState {
    stopped: bool,
    last_outcome: Option<DeletionOutcome>,
    last_error: Option<String>,
    /// A finished run the store refused to record.
    unrecorded_run: Option<DateTime<Utc>>,
}

/// The background deletion worker.
pub struct DeletionWorker {
    store: Arc<ScheduleStore>,
    guard: DeletionGuard,
    scheduler: Arc<WakeScheduler>,
    sink: Arc<dyn OutcomeSink>,
    wake_hold: Arc<dyn WakeHoldProvider>,
    settings: WorkerSettings,
    running: Arc<AtomicBool>,
    state: Mutex<WorkerState>,
}

impl DeletionWorker {
    /// Create a stopped worker. Call `activate` to arm it.
    pub fn new(
        store: Arc<ScheduleStore>,
        guard: DeletionGuard,
        scheduler: Arc<WakeScheduler>,
        sink: Arc<dyn OutcomeSink>,
        wake_hold: Arc<dyn WakeHoldProvider>,
        settings: WorkerSettings,
    ) -> Self {
        let last_outcome = store.last_outcome().unwrap_or_else(|e| {
            tracing::warn!("⚠️ Could not load last outcome: {e}");
            None
        });
        Self {
            store,
            guard,
            scheduler,
            sink,
            wake_hold,
            settings,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(WorkerState {
                stopped: true,
                last_outcome,
                last_error: None,
                unrecorded_run: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn phase(&self) -> WorkerPhase {
        if self.running.load(Ordering::Acquire) {
            WorkerPhase::Running
        } else if self.state().stopped {
            WorkerPhase::Stopped
        } else {
            WorkerPhase::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        !self.state().stopped
    }

    /// Make the worker resident and arm the next wake-up.
    pub fn activate(&self) -> Result<DateTime<Utc>> {
        self.state().stopped = false;
        self.arm()
    }

    /// Stop accepting wake-ups and cancel the pending one.
    /// A run already in progress finishes normally but does not re-arm.
    pub fn deactivate(&self) {
        self.state().stopped = true;
        self.scheduler.cancel_all();
        tracing::info!("⏹️ Deletion worker stopped");
    }

    /// Next due time, counting a finished run the store has not recorded.
    fn expected_due(&self) -> Result<DateTime<Utc>> {
        let mut schedule = self.store.get()?;
        let unrecorded = self.state().unrecorded_run;
        if let Some(at) = unrecorded
            && schedule.last_run_at.is_none_or(|last| last < at)
        {
            schedule.last_run_at = Some(at);
        }
        Ok(due::next_due_at(&schedule, &Local::now()))
    }

    fn arm(&self) -> Result<DateTime<Utc>> {
        match self
            .expected_due()
            .and_then(|due| self.scheduler.arm_at(due))
        {
            Ok(due) => {
                let mut state = self.state();
                if state.unrecorded_run.is_none() {
                    state.last_error = None;
                }
                Ok(due)
            }
            Err(e) => {
                self.note_error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn note_error(&self, message: String) {
        tracing::error!("❌ {message}");
        self.state().last_error = Some(message);
    }

    /// Claim the run slot. `None` if stopped, disabled in the store, or a
    /// run is already active.
    pub fn try_begin_run(&self) -> Option<RunGuard> {
        if self.state().stopped {
            tracing::info!("Wake-up ignored: worker is stopped");
            return None;
        }
        // `stop` may have come from another process since the last self-check.
        if let Ok(schedule) = self.store.get()
            && !schedule.enabled
        {
            tracing::info!("Wake-up ignored: service disabled");
            self.deactivate();
            self.publish_status();
            return None;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("Deletion already running, trigger ignored");
            return None;
        }
        Some(RunGuard {
            flag: self.running.clone(),
        })
    }

    /// Run on the current thread. `None` if the trigger was a no-op.
    pub fn run_once(&self) -> Option<DeletionOutcome> {
        let guard = self.try_begin_run()?;
        Some(self.run_with_guard(guard))
    }

    /// Claim the run slot now and perform the run on the blocking pool.
    pub fn spawn_run(self: &Arc<Self>) -> Option<JoinHandle<DeletionOutcome>> {
        let guard = self.try_begin_run()?;
        let worker = self.clone();
        Some(tokio::task::spawn_blocking(move || {
            worker.run_with_guard(guard)
        }))
    }

    fn run_with_guard(&self, _guard: RunGuard) -> DeletionOutcome {
        let _hold = self
            .wake_hold
            .acquire("folder deletion", self.settings.max_wake_hold);
        tracing::info!("🧹 Deletion run started");

        let schedule = match self.store.get() {
            Ok(schedule) => schedule,
            Err(e) => {
                self.note_error(format!("Could not read schedule: {e}"));
                self.publish_status();
                return DeletionOutcome::default();
            }
        };

        let outcome = self.guard.delete_selected(&schedule.selected_paths);

        let finished_at = Utc::now().trunc_subsecs(3);
        match self.store.record_run(finished_at) {
            Ok(()) => self.state().unrecorded_run = None,
            Err(e) => {
                // Kept in memory so the next wake-up still moves forward.
                self.state().unrecorded_run = Some(finished_at);
                self.note_error(format!("Could not record run: {e}"));
            }
        }
        if let Err(e) = self.store.record_outcome(&outcome) {
            tracing::warn!("⚠️ Could not persist outcome: {e}");
        }
        self.state().last_outcome = Some(outcome.clone());

        let still_enabled = self.store.get().map(|s| s.enabled).unwrap_or(false);
        if still_enabled && self.is_active() {
            // Errors are already recorded; the self-check retries.
            let _ = self.arm();
        } else {
            tracing::info!("Service disabled, next run not armed");
        }

        self.sink.publish_outcome(&outcome);
        self.publish_status();
        outcome
    }

    /// Verify that the pending wake-up exists and matches the schedule,
    /// re-arming when it is missing, stale or overdue.
    pub fn health_check(&self) -> Result<HealthAction> {
        if self.phase() != WorkerPhase::Idle {
            return Ok(HealthAction::Skipped);
        }
        self.retry_record_run();

        let expected = self.expected_due()?;
        let reason = match self.scheduler.armed_at() {
            None => Some("missing"),
            Some(at) if at != expected => Some("schedule changed"),
            Some(at) if due::is_overdue(at, Utc::now(), self.settings.drift_tolerance) => {
                Some("overdue")
            }
            Some(_) => None,
        };

        match reason {
            Some(reason) => {
                tracing::warn!("🩺 Wake-up {reason}, re-arming");
                self.arm()?;
                self.publish_status();
                Ok(HealthAction::Rearmed(reason))
            }
            None => {
                tracing::debug!("🩺 Wake-up healthy");
                Ok(HealthAction::Healthy)
            }
        }
    }

    fn retry_record_run(&self) {
        let Some(at) = self.state().unrecorded_run else {
            return;
        };
        match self.store.record_run(at) {
            Ok(()) => {
                tracing::info!("💾 Recorded deferred run from {at}");
                let mut state = self.state();
                state.unrecorded_run = None;
                state.last_error = None;
            }
            Err(e) => tracing::warn!("⚠️ Run still unrecorded: {e}"),
        }
    }

    /// Push a fresh status snapshot to the sink.
    pub fn publish_status(&self) {
        self.sink.publish_status(&self.status());
    }

    pub fn status(&self) -> EngineStatus {
        let next_due_at = self
            .expected_due()
            .ok()
            .or_else(|| self.scheduler.armed_at())
            .unwrap_or_else(Utc::now);
        let state = self.state();
        EngineStatus {
            running: !state.stopped,
            next_due_at,
            last_outcome: state.last_outcome.clone(),
            last_error: state.last_error.clone(),
        }
    }
}
