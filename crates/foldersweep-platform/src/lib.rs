//! # FolderSweep Platform
//!
//! Host facilities the engine depends on through traits: keeping the machine
//! awake during a run, showing desktop notifications and checking that the
//! daemon can actually reach the selected folders. What the host offers is
//! probed once at startup and resolved into a `Capabilities` table.

pub mod capabilities;
pub mod gate;
pub mod notifier;
pub mod wakelock;

pub use capabilities::{Capabilities, PlatformFeatures};
pub use gate::FsAccessGate;
pub use notifier::DesktopNotifier;
pub use wakelock::{CommandHoldProvider, NoopHoldProvider};
