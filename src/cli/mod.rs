//! CLI argument parsing for vise.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vise: advisory lock coordination for CAD files on shared storage.
///
/// Locks are sidecar marker files in a shared directory:
/// - One marker per locked CAD file, named by a hash of its path
/// - Markers carry owner, host and timestamps as readable JSON
/// - Deleting the marker releases the lock
#[derive(Parser, Debug)]
#[command(name = "vise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Lock directory (overrides VISE_LOCKS_DIR and discovery).
    #[arg(long, global = true, value_name = "DIR")]
    pub lock_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for vise.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lock a CAD file.
    ///
    /// Creates a lock marker claiming the file for the given user
    /// (defaults to the current user).
    Lock(LockArgs),

    /// Unlock a CAD file.
    ///
    /// Removes the lock marker. Only the owning user may unlock.
    Unlock(UnlockArgs),

    /// Check whether a CAD file is locked.
    ///
    /// Prints the owner and lock age, or "not locked".
    Check(CheckArgs),

    /// List all active locks.
    ///
    /// Stale and corrupt markers are evicted as a side effect.
    List,

    /// Show lock statistics.
    ///
    /// Totals, per-user activity, detection methods and lock ages.
    Stats,

    /// Remove locks older than a threshold.
    ///
    /// Age is measured from the last heartbeat (creation time when a
    /// lock never had one).
    Cleanup(CleanupArgs),

    /// Remove every lock owned by a user, regardless of age.
    UnlockAll(UnlockAllArgs),

    /// Refresh a lock's last-seen timestamp.
    ///
    /// Keeps a long-running session's lock out of cleanup's reach.
    #[command(alias = "touch")]
    Heartbeat(HeartbeatArgs),

    /// Watch CAD processes and manage locks automatically.
    ///
    /// Runs the reconciliation loop in the foreground: files opened in
    /// recognized CAD applications are locked, closed files unlocked.
    Monitor(MonitorArgs),

    /// Start the monitor as a background process.
    Start,

    /// Stop the background monitor.
    Stop,

    /// Report whether the background monitor is running.
    Status,

    /// Serve the HTTP/WebSocket lock API.
    ///
    /// Also runs the monitor alongside the server.
    Serve(ServeArgs),
}

/// Arguments for the `lock` command.
#[derive(Parser, Debug)]
pub struct LockArgs {
    /// CAD file path to lock.
    pub file: String,

    /// User claiming the lock (defaults to the current user).
    #[arg(short, long)]
    pub user: Option<String>,

    /// Process id to record on the lock.
    #[arg(long)]
    pub process_id: Option<u32>,
}

/// Arguments for the `unlock` command.
#[derive(Parser, Debug)]
pub struct UnlockArgs {
    /// CAD file path to unlock.
    pub file: String,

    /// User releasing the lock (defaults to the current user).
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Arguments for the `check` command.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// CAD file path to check.
    pub file: String,
}

/// Arguments for the `cleanup` command.
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Remove locks with no activity for this many hours.
    #[arg(long, default_value_t = 24.0)]
    pub max_age_hours: f64,
}

/// Arguments for the `unlock-all` command.
#[derive(Parser, Debug)]
pub struct UnlockAllArgs {
    /// Owner whose locks are removed (defaults to the current user).
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Arguments for the `heartbeat` command.
#[derive(Parser, Debug)]
pub struct HeartbeatArgs {
    /// CAD file path whose lock to refresh.
    pub file: String,

    /// Owner of the lock (defaults to the current user).
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Arguments for the `monitor` command.
#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Poll interval in milliseconds (defaults to the configured value).
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Run a single iteration and exit.
    #[arg(long)]
    pub once: bool,
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind (defaults to the configured value).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (defaults to the configured value).
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
