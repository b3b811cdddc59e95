//! Host capability probing.
//!
//! Tools are looked up on `PATH` once at startup. `Capabilities::resolve`
//! then walks each strategy list in preference order and keeps the first
//! provider whose tool is present.

use std::path::PathBuf;
use std::sync::Arc;

use foldersweep_core::SweepConfig;
use foldersweep_core::traits::WakeHoldProvider;
use foldersweep_scheduler::NotifySink;

use crate::notifier::DesktopNotifier;
use crate::wakelock::{CommandHoldProvider, NoopHoldProvider};

/// Host tools found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct PlatformFeatures {
    pub systemd_inhibit: Option<PathBuf>,
    pub caffeinate: Option<PathBuf>,
    pub notify_send: Option<PathBuf>,
    pub osascript: Option<PathBuf>,
}

impl PlatformFeatures {
    pub fn detect() -> Self {
        let features = Self {
            systemd_inhibit: which::which("systemd-inhibit").ok(),
            caffeinate: which::which("caffeinate").ok(),
            notify_send: which::which("notify-send").ok(),
            osascript: which::which("osascript").ok(),
        };
        tracing::debug!("Platform features: {features:?}");
        features
    }
}

type HoldStrategy = fn(&PlatformFeatures) -> Option<Arc<dyn WakeHoldProvider>>;
type NotifyStrategy = fn(&PlatformFeatures) -> Option<Arc<dyn NotifySink>>;

const HOLD_STRATEGIES: &[HoldStrategy] = &[systemd_inhibit_hold, caffeinate_hold];
const NOTIFY_STRATEGIES: &[NotifyStrategy] = &[notify_send_notifier, osascript_notifier];

fn systemd_inhibit_hold(f: &PlatformFeatures) -> Option<Arc<dyn WakeHoldProvider>> {
    let program = f.systemd_inhibit.clone()?;
    Some(Arc::new(CommandHoldProvider::systemd_inhibit(program)))
}

fn caffeinate_hold(f: &PlatformFeatures) -> Option<Arc<dyn WakeHoldProvider>> {
    let program = f.caffeinate.clone()?;
    Some(Arc::new(CommandHoldProvider::caffeinate(program)))
}

fn notify_send_notifier(f: &PlatformFeatures) -> Option<Arc<dyn NotifySink>> {
    let program = f.notify_send.clone()?;
    Some(Arc::new(DesktopNotifier::notify_send(program)))
}

fn osascript_notifier(f: &PlatformFeatures) -> Option<Arc<dyn NotifySink>> {
    let program = f.osascript.clone()?;
    Some(Arc::new(DesktopNotifier::osascript(program)))
}

/// Providers chosen for this host.
pub struct Capabilities {
    pub wake_hold: Arc<dyn WakeHoldProvider>,
    /// `None` when no desktop notifier exists or notifications are disabled.
    pub notifier: Option<Arc<dyn NotifySink>>,
}

impl Capabilities {
    pub fn resolve(features: &PlatformFeatures, config: &SweepConfig) -> Self {
        let wake_hold: Arc<dyn WakeHoldProvider> = HOLD_STRATEGIES
            .iter()
            .find_map(|strategy| strategy(features))
            .unwrap_or_else(|| Arc::new(NoopHoldProvider));

        let notifier = if config.notify.desktop {
            NOTIFY_STRATEGIES.iter().find_map(|strategy| strategy(features))
        } else {
            None
        };

        let caps = Self { wake_hold, notifier };
        tracing::info!("🧩 Capabilities: {}", caps.describe());
        caps
    }

    pub fn describe(&self) -> String {
        format!(
            "wake hold = {}, notifications = {}",
            self.wake_hold.name(),
            self.notifier.as_ref().map(|n| n.name()).unwrap_or("log only")
        )
    }
}
