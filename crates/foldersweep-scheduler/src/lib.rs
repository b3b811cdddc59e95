//! # FolderSweep Scheduler
//!
//! Keeps the deletion schedule, arms a single wake-up for the next due run
//! and performs the run when it fires.
//!
//! ## Architecture
//! ```text
//! Supervisor (event loop, restarts on crash)
//!   ├── Boot / Update / TaskRemoved → start worker if enabled
//!   ├── DeletionDue                 → DeletionWorker::spawn_run
//!   └── self-check tick             → reconcile enabled flag, repair wake-up
//!
//! DeletionWorker
//!   ├── single-run guard + wake hold
//!   ├── DeletionGuard::delete_selected
//!   ├── ScheduleStore::record_run
//!   └── WakeScheduler::arm_next → WakeTimer
//! ```

pub mod due;
pub mod engine;
pub mod notify;
pub mod store;
pub mod supervisor;
pub mod wake;

pub use engine::{DeletionWorker, HealthAction, RunGuard, WorkerPhase, WorkerSettings};
pub use notify::{LogSink, Notification, NotifyPriority, NotifyRouter, NotifySink};
pub use store::ScheduleStore;
pub use supervisor::{Supervisor, SupervisorSettings, SystemEvent, enable_service, preflight};
pub use wake::{TokioWakeTimer, WakeScheduler, WakeTimer};
