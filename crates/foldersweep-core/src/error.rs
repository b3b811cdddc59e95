//! Error types for FolderSweep.

/// Crate-wide error.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    /// The timer facility refused or failed to register a wake-up.
    #[error("Scheduling failure: {0}")]
    SchedulingFailure(String),

    #[error("Required access not granted: {0}")]
    AccessDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SweepError>;
