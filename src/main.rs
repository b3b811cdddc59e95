//! # FolderSweep
//!
//! Deletes user-selected folders on a fixed schedule, unattended.
//!
//! Usage:
//!   foldersweep daemon                       # Run the background service
//!   foldersweep set-paths ~/Downloads/tmp    # Choose folders to delete
//!   foldersweep set-interval 3               # Every 3 days
//!   foldersweep set-time 02:00               # First run at 02:00
//!   foldersweep start | stop                 # Enable or disable the service
//!   foldersweep status [--json]
//!   foldersweep check /some/path             # Is this path protected?

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use foldersweep_core::{SweepConfig, TimeOfDay};
use foldersweep_platform::{Capabilities, FsAccessGate, PlatformFeatures};
use foldersweep_scheduler::{NotifyPriority, due};
use foldersweep_scheduler::{
    DeletionWorker, LogSink, NotifyRouter, ScheduleStore, Supervisor, SupervisorSettings,
    SystemEvent, TokioWakeTimer, WakeScheduler, WorkerSettings, enable_service,
};
use foldersweep_security::{DeletionGuard, ProtectedPathSet};

#[derive(Parser)]
#[command(
    name = "foldersweep",
    version,
    about = "🧹 FolderSweep: scheduled folder deletion"
)]
struct Cli {
    /// Config file (default: ~/.foldersweep/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background service
    Daemon,
    /// Show the schedule, next run and last result
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Days between runs
    SetInterval { days: u32 },
    /// Time of day for the first run (HH:MM, local time)
    SetTime { time: String },
    /// Replace the folders to delete
    SetPaths {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Enable the service
    Start,
    /// Disable the service
    Stop,
    /// Report whether a path is protected from deletion
    Check { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "foldersweep=debug"
    } else {
        "foldersweep=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => SweepConfig::load_from(path)?,
        None => SweepConfig::load()?,
    };

    match cli.command {
        Command::Daemon => run_daemon(config).await,
        Command::Status { json } => show_status(&config, json),
        Command::SetInterval { days } => {
            open_store(&config)?.set_interval(days)?;
            println!("✅ Interval set to every {days} day(s)");
            Ok(())
        }
        Command::SetTime { time } => {
            let tod = TimeOfDay::parse(&time)?;
            open_store(&config)?.set_time_of_day(tod.hour, tod.minute)?;
            println!("✅ Time of day set to {tod}");
            Ok(())
        }
        Command::SetPaths { paths } => set_paths(&config, paths),
        Command::Start => {
            let gate = FsAccessGate::new(config.data_dir());
            enable_service(&open_store(&config)?, &gate)?;
            println!("▶️ Service enabled. The daemon arms it on SIGHUP or its next self-check.");
            Ok(())
        }
        Command::Stop => {
            open_store(&config)?.set_enabled(false)?;
            println!("⏸️ Service disabled. Pending wake-ups will not delete anything.");
            Ok(())
        }
        Command::Check { path } => {
            let protected = protected_set(&config);
            let path = std::path::absolute(&path).unwrap_or(path);
            match protected.matching_rule(&path) {
                Some(rule) => println!("🛡️ {} is protected by {rule}", path.display()),
                None if protected.is_protected(&path) => {
                    println!("🛡️ {} is protected", path.display())
                }
                None => println!("✅ {} can be deleted", path.display()),
            }
            Ok(())
        }
    }
}

fn open_store(config: &SweepConfig) -> Result<ScheduleStore> {
    let path = config.store_path();
    ScheduleStore::open(&path).with_context(|| format!("opening {}", path.display()))
}

fn protected_set(config: &SweepConfig) -> ProtectedPathSet {
    ProtectedPathSet::new(&config.data_dir(), &config.protection.expanded_paths())
}

fn set_paths(config: &SweepConfig, paths: Vec<PathBuf>) -> Result<()> {
    let protected = protected_set(config);
    let mut absolute = Vec::with_capacity(paths.len());
    for path in paths {
        let path = std::path::absolute(&path)
            .with_context(|| format!("resolving {}", path.display()))?;
        if protected.is_protected(&path) {
            println!("⚠️ {} is protected and will always be skipped", path.display());
        }
        absolute.push(path);
    }
    let count = absolute.len();
    open_store(config)?.set_selected_paths(absolute)?;
    println!("✅ {count} folder(s) selected");
    Ok(())
}

const RECENT_NOTIFICATIONS: usize = 5;

fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %d, %Y at %H:%M").to_string()
}

fn show_status(config: &SweepConfig, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let schedule = store.get()?;
    let next = due::next_due_at(&schedule, &Local::now());
    let last_outcome = store.last_outcome()?;
    let notifications = store.notifications()?;

    if json {
        let value = serde_json::json!({
            "schedule": schedule,
            "next_due_at": next,
            "last_outcome": last_outcome,
            "notifications": notifications,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("🧹 FolderSweep status");
    println!(
        "   Service:   {}",
        if schedule.enabled { "enabled" } else { "disabled" }
    );
    println!(
        "   Schedule:  every {} day(s), first run at {}",
        schedule.interval_days, schedule.time_of_day
    );
    if schedule.selected_paths.is_empty() {
        println!("   Folders:   (none selected)");
    } else {
        println!("   Folders:");
        for path in &schedule.selected_paths {
            println!("     - {}", path.display());
        }
    }
    match schedule.last_run_at {
        Some(at) => println!("   Last run:  {}", format_local(at)),
        None => println!("   Last run:  never"),
    }
    println!("   Next run:  {}", format_local(next));
    if let Some(outcome) = last_outcome {
        println!("   Result:    {}", outcome.summary());
        for failure in &outcome.failures {
            println!("     ✗ {}: {}", failure.path.display(), failure.reason);
        }
    }
    if !notifications.is_empty() {
        println!("   Recent notifications:");
        for n in notifications.iter().rev().take(RECENT_NOTIFICATIONS) {
            let marker = match n.priority {
                NotifyPriority::High => "🔴",
                NotifyPriority::Normal => "🔔",
            };
            println!("     {marker} {} {}", format_local(n.timestamp), n.title);
        }
    }
    Ok(())
}

async fn run_daemon(config: SweepConfig) -> Result<()> {
    tracing::info!("🧹 FolderSweep daemon v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(open_store(&config)?);
    let guard = DeletionGuard::new(protected_set(&config));
    let caps = Capabilities::resolve(&PlatformFeatures::detect(), &config);

    let mut router = NotifyRouter::new(store.clone());
    router.register_sink(Arc::new(LogSink));
    if let Some(notifier) = caps.notifier.clone() {
        router.register_sink(notifier);
    }

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let timer = Arc::new(TokioWakeTimer::new(tokio::runtime::Handle::current(), tx.clone()));
    let scheduler = Arc::new(WakeScheduler::new(store.clone(), timer));
    let worker = Arc::new(DeletionWorker::new(
        store.clone(),
        guard,
        scheduler,
        Arc::new(router),
        caps.wake_hold.clone(),
        WorkerSettings::from_config(&config),
    ));
    let supervisor = Arc::new(Supervisor::new(
        store.clone(),
        worker,
        Arc::new(FsAccessGate::new(config.data_dir())),
        SupervisorSettings::from_config(&config),
    ));

    let version = env!("CARGO_PKG_VERSION");
    let first_event = match store.seen_version()? {
        Some(seen) if seen != version => {
            tracing::info!("⬆️ Updated from v{seen} to v{version}");
            SystemEvent::Update
        }
        _ => SystemEvent::Boot,
    };
    store.record_version(version)?;
    tx.send(first_event)?;

    let shutdown = CancellationToken::new();
    spawn_signal_handler(supervisor.clone(), shutdown.clone())?;

    supervisor
        .run_supervised(Arc::new(Mutex::new(rx)), shutdown)
        .await;
    tracing::info!("👋 FolderSweep daemon stopped");
    Ok(())
}

#[cfg(unix)]
fn spawn_signal_handler(supervisor: Arc<Supervisor>, shutdown: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP: reloading schedule");
                    if let Err(e) = supervisor.reconcile() {
                        tracing::warn!("⚠️ Reload failed: {e}");
                    }
                }
                _ = terminate.recv() => break,
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        tracing::info!("Shutdown requested");
        shutdown.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_handler(_supervisor: Arc<Supervisor>, shutdown: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
        shutdown.cancel();
    });
    Ok(())
}
