//! # FolderSweep Security
//!
//! Everything that decides whether a path may be deleted, and the only code
//! in the workspace that actually removes files.

pub mod guard;
pub mod protected;

pub use guard::{DeleteError, DeletionGuard};
pub use protected::{ProtectedPathSet, ProtectedRule};
