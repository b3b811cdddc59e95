//! Wake-up scheduling.
//!
//! `WakeScheduler` owns the single pending wake-up of the engine: it reads
//! the store, computes the next due time and registers it with a
//! `WakeTimer`, always cancelling whatever was armed before.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use foldersweep_core::{Result, SweepError};

use crate::due;
use crate::store::ScheduleStore;
use crate::supervisor::SystemEvent;

/// Timer facility that delivers one-shot wake-ups.
pub trait WakeTimer: Send + Sync {
    /// Register a wake-up at `at`, replacing any pending one.
    fn register(&self, at: DateTime<Utc>) -> Result<()>;

    /// Drop the pending wake-up, if any.
    fn cancel(&self);

    /// Deadline of the pending wake-up. `None` once it fired or was cancelled.
    fn armed_at(&self) -> Option<DateTime<Utc>>;

    fn is_armed(&self) -> bool {
        self.armed_at().is_some()
    }
}

struct Armed {
    at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Tokio-backed timer: a sleeping task that posts `SystemEvent::DeletionDue`.
/// An elapsed deadline fires immediately.
pub struct TokioWakeTimer {
    runtime: tokio::runtime::Handle,
    events: UnboundedSender<SystemEvent>,
    armed: Mutex<Option<Armed>>,
}

impl TokioWakeTimer {
    pub fn new(runtime: tokio::runtime::Handle, events: UnboundedSender<SystemEvent>) -> Self {
        Self {
            runtime,
            events,
            armed: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Armed>> {
        self.armed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WakeTimer for TokioWakeTimer {
    fn register(&self, at: DateTime<Utc>) -> Result<()> {
        if self.events.is_closed() {
            return Err(SweepError::SchedulingFailure(
                "event loop is gone, nothing would receive the wake-up".into(),
            ));
        }

        let mut armed = self.lock();
        if let Some(prev) = armed.take() {
            prev.handle.abort();
        }

        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let events = self.events.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(SystemEvent::DeletionDue).is_err() {
                tracing::warn!("⚠️ Wake-up fired but the event loop is gone");
            }
        });
        *armed = Some(Armed { at, handle });
        Ok(())
    }

    fn cancel(&self) {
        if let Some(prev) = self.lock().take() {
            prev.handle.abort();
        }
    }

    fn armed_at(&self) -> Option<DateTime<Utc>> {
        match &*self.lock() {
            Some(armed) if !armed.handle.is_finished() => Some(armed.at),
            _ => None,
        }
    }
}

/// Keeps exactly one wake-up armed for the next due run.
pub struct WakeScheduler {
    store: Arc<ScheduleStore>,
    timer: Arc<dyn WakeTimer>,
}

impl WakeScheduler {
    pub fn new(store: Arc<ScheduleStore>, timer: Arc<dyn WakeTimer>) -> Self {
        Self { store, timer }
    }

    /// Due time derived from the current store contents.
    pub fn next_due_at(&self) -> Result<DateTime<Utc>> {
        let schedule = self.store.get()?;
        Ok(due::next_due_at(&schedule, &Local::now()))
    }

    /// Cancel any pending wake-up and arm one for the next due time.
    pub fn arm_next(&self) -> Result<DateTime<Utc>> {
        self.arm_at(self.next_due_at()?)
    }

    /// Cancel any pending wake-up and arm one at `due`.
    pub fn arm_at(&self, due: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.timer.cancel();
        self.timer.register(due)?;
        tracing::info!(
            "⏰ Next deletion scheduled for {}",
            due.with_timezone(&Local).format("%b %d, %Y at %H:%M")
        );
        Ok(due)
    }

    /// Remove the pending wake-up. Never interrupts a run in progress.
    pub fn cancel_all(&self) {
        self.timer.cancel();
        tracing::info!("All wake-ups cancelled");
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn armed_at(&self) -> Option<DateTime<Utc>> {
        self.timer.armed_at()
    }
}
