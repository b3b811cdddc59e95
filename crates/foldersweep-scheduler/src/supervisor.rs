//! Lifecycle supervisor: routes system events to the worker, starts and
//! stops the service, and keeps the event loop alive across crashes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use foldersweep_core::traits::AccessGate;
use foldersweep_core::{EngineStatus, Result, ScheduleConfig, SweepConfig, SweepError};

use crate::engine::{DeletionWorker, HealthAction};
use crate::store::ScheduleStore;

/// Events delivered by the host platform or the wake timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    /// Machine (or daemon) came up.
    Boot,
    /// A new version of the daemon was installed.
    Update,
    /// The armed wake-up fired.
    DeletionDue,
    /// The host tore down the worker's task.
    TaskRemoved,
}

/// Check that a schedule may be started: folders chosen, access granted.
pub fn preflight(schedule: &ScheduleConfig, gate: &dyn AccessGate) -> Result<()> {
    if schedule.selected_paths.is_empty() {
        return Err(SweepError::Config("No folders selected for deletion".into()));
    }
    let missing = gate.missing_access(schedule);
    if !missing.is_empty() {
        return Err(SweepError::AccessDenied(missing.join(", ")));
    }
    Ok(())
}

/// Persist the user's start request after `preflight`. A running daemon picks
/// the flag up on its next self-check or reload.
pub fn enable_service(store: &ScheduleStore, gate: &dyn AccessGate) -> Result<()> {
    preflight(&store.get()?, gate)?;
    store.set_enabled(true)
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    pub health_check_interval: Duration,
    pub restart_backoff: Duration,
    pub restart_on_crash: bool,
}

impl SupervisorSettings {
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            health_check_interval: config.health_check_interval(),
            restart_backoff: config.restart_backoff(),
            restart_on_crash: true,
        }
    }
}

pub struct Supervisor {
    store: Arc<ScheduleStore>,
    worker: Arc<DeletionWorker>,
    gate: Arc<dyn AccessGate>,
    settings: SupervisorSettings,
}

impl Supervisor {
    pub fn new(
        store: Arc<ScheduleStore>,
        worker: Arc<DeletionWorker>,
        gate: Arc<dyn AccessGate>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            store,
            worker,
            gate,
            settings,
        }
    }

    pub fn worker(&self) -> &Arc<DeletionWorker> {
        &self.worker
    }

    /// Handle one system event.
    pub fn dispatch(&self, event: SystemEvent) -> Result<()> {
        tracing::debug!("📨 {event:?}");
        match event {
            SystemEvent::Boot | SystemEvent::Update | SystemEvent::TaskRemoved => {
                let schedule = self.store.get()?;
                if schedule.enabled {
                    tracing::info!("🔄 {event:?}: service enabled, starting worker");
                    self.ensure_started()?;
                    // Still started: inaccessible folders fail per path on the run.
                    let missing = self.gate.missing_access(&schedule);
                    if !missing.is_empty() {
                        self.worker
                            .note_error(format!("Access lost: {}", missing.join(", ")));
                    }
                } else {
                    tracing::info!("{event:?}: service disabled, staying idle");
                }
            }
            SystemEvent::DeletionDue => {
                if let Some(handle) = self.worker.spawn_run() {
                    tokio::spawn(async move {
                        if let Err(e) = handle.await {
                            tracing::error!("💥 Deletion run crashed: {e}");
                        }
                    });
                }
            }
        }
        Ok(())
    }

    /// Enable the service after checking folders and access.
    pub fn start(&self) -> Result<()> {
        enable_service(&self.store, self.gate.as_ref())?;
        self.ensure_started()?;
        tracing::info!("▶️ Service started");
        Ok(())
    }

    /// Start the worker if needed and arm the next wake-up. Idempotent.
    pub fn ensure_started(&self) -> Result<()> {
        self.worker.activate()?;
        self.worker.publish_status();
        Ok(())
    }

    /// Disable the service and cancel pending wake-ups.
    /// A run already in progress completes.
    pub fn stop(&self) -> Result<()> {
        self.store.set_enabled(false)?;
        self.worker.deactivate();
        self.worker.publish_status();
        tracing::info!("⏸️ Service stopped");
        Ok(())
    }

    /// Align the worker with the persisted `enabled` flag (which other
    /// processes may have changed) and self-check the wake-up.
    pub fn reconcile(&self) -> Result<()> {
        let enabled = self.store.get()?.enabled;
        match (enabled, self.worker.is_active()) {
            (true, false) => {
                tracing::info!("Service enabled externally, starting worker");
                self.ensure_started()
            }
            (false, true) => {
                tracing::info!("Service disabled externally, stopping worker");
                self.worker.deactivate();
                self.worker.publish_status();
                Ok(())
            }
            (true, true) => match self.worker.health_check() {
                Ok(HealthAction::Rearmed(reason)) => {
                    tracing::info!("🩺 Self-check re-armed wake-up ({reason})");
                    Ok(())
                }
                Ok(_) => Ok(()),
                Err(e) => {
                    self.worker.note_error(format!("Self-check failed: {e}"));
                    Err(e)
                }
            },
            (false, false) => Ok(()),
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.worker.status()
    }

    /// Process events until `shutdown` fires or the channel closes.
    /// Queued events are handled before the periodic self-check.
    pub async fn run_event_loop(
        self: Arc<Self>,
        events: Arc<Mutex<UnboundedReceiver<SystemEvent>>>,
        shutdown: CancellationToken,
    ) {
        let mut rx = events.lock().await;
        let mut tick = tokio::time::interval(self.settings.health_check_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        tracing::info!(
            "⏰ Event loop running (self-check every {}s)",
            self.settings.health_check_interval.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Event loop shutting down");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.dispatch(event) {
                            self.worker.note_error(format!("{event:?} failed: {e}"));
                        }
                    }
                    None => {
                        tracing::info!("Event channel closed");
                        break;
                    }
                },
                _ = tick.tick() => {
                    if let Err(e) = self.reconcile() {
                        tracing::warn!("⚠️ Self-check failed: {e}");
                    }
                }
            }
        }
    }

    /// Run the event loop, restarting it after a panic while the service is
    /// enabled.
    pub async fn run_supervised(
        self: Arc<Self>,
        events: Arc<Mutex<UnboundedReceiver<SystemEvent>>>,
        shutdown: CancellationToken,
    ) {
        loop {
            let task = tokio::spawn(
                self.clone()
                    .run_event_loop(events.clone(), shutdown.clone()),
            );
            match task.await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    tracing::error!("💥 Event loop crashed: {e}");
                    if shutdown.is_cancelled() || !self.settings.restart_on_crash {
                        break;
                    }
                    let enabled = self.store.get().map(|s| s.enabled).unwrap_or(false);
                    if !enabled {
                        tracing::warn!("Service disabled, not restarting");
                        break;
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.restart_backoff) => {}
                    }
                    tracing::info!("🔁 Restarting event loop");
                    if let Err(e) = self.ensure_started() {
                        self.worker.note_error(format!("Restart failed: {e}"));
                    }
                }
                Err(e) => {
                    tracing::error!("Event loop aborted: {e}");
                    break;
                }
            }
        }
    }
}
