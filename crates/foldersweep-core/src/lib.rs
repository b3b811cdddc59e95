//! # FolderSweep Core
//!
//! Shared building blocks for the scheduled-deletion engine:
//! configuration, the crate-wide error type, schedule/outcome data types,
//! and the traits the engine uses to talk to its collaborators
//! (notifications, wake holds, access gates).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::SweepConfig;
pub use error::{Result, SweepError};
pub use types::{DeletionOutcome, EngineStatus, PathFailure, ScheduleConfig, TimeOfDay};
