//! Reconciliation between successive process snapshots and the lock store.
//!
//! Each poll cycle diffs the new snapshot against the previous one:
//! newly-opened CAD files get auto-created locks, closed files (including
//! everything a terminated process held) get their locks released. Lock
//! failures are logged and the loop keeps going; a conflict with another
//! user's lock is expected traffic here, not a fault.

use crate::locks::{DetectionMethod, LockStore};
use crate::monitor::snapshot::{ProcessScanner, Snapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long `stop` waits for the poll thread before detaching it.
pub const DEFAULT_STOP_WAIT: Duration = Duration::from_secs(5);

/// File transitions between two snapshots.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Files that appeared in a process's open set, with the pid.
    pub opened: Vec<(u32, String)>,
    /// Files that left a process's open set, with the pid. A terminated
    /// process contributes its entire previous set.
    pub closed: Vec<(u32, String)>,
}

/// Diff two snapshots. A pid absent from `old` counts all of its files
/// as opened; a pid absent from `new` counts all of its files as closed.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for (pid, files) in new {
        match old.get(pid) {
            Some(previous) => {
                for path in files.difference(previous) {
                    diff.opened.push((*pid, path.clone()));
                }
            }
            None => {
                for path in files {
                    diff.opened.push((*pid, path.clone()));
                }
            }
        }
    }

    for (pid, files) in old {
        match new.get(pid) {
            Some(current) => {
                for path in files.difference(current) {
                    diff.closed.push((*pid, path.clone()));
                }
            }
            None => {
                for path in files {
                    diff.closed.push((*pid, path.clone()));
                }
            }
        }
    }

    diff
}

/// One poll cycle: scan, diff against `previous`, apply lock changes.
///
/// Returns the snapshot to diff against next time. A failed scan keeps
/// `previous` so nothing is treated as closed by a transient read error.
pub fn run_iteration(
    store: &LockStore,
    scanner: &ProcessScanner,
    owner_user: &str,
    owner_host: &str,
    previous: Snapshot,
) -> Snapshot {
    let current = match scanner.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::error!("process scan failed: {}", e);
            return previous;
        }
    };

    let diff = diff_snapshots(&previous, &current);

    for (pid, path) in &diff.opened {
        match store.create_lock(
            path,
            owner_user,
            owner_host,
            Some(*pid),
            true,
            DetectionMethod::Auto,
        ) {
            Ok(_) => log::info!("auto-locked '{}' (pid {})", path, pid),
            Err(e) => log::warn!("could not auto-lock '{}': {}", path, e),
        }
    }

    for (pid, path) in &diff.closed {
        match store.remove_lock(path, owner_user) {
            Ok(_) => log::info!("auto-unlocked '{}' (pid {})", path, pid),
            Err(e) => log::warn!("could not auto-unlock '{}': {}", path, e),
        }
    }

    current
}

/// Background poll loop over one scanner and one lock store.
pub struct FileMonitor {
    store: LockStore,
    scanner: ProcessScanner,
    check_interval: Duration,
    owner_user: String,
    owner_host: String,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FileMonitor {
    pub fn new(
        store: LockStore,
        scanner: ProcessScanner,
        check_interval: Duration,
        owner_user: String,
        owner_host: String,
    ) -> Self {
        Self {
            store,
            scanner,
            check_interval,
            owner_user,
            owner_host,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start polling in a background thread. No-op when already running.
    pub fn start(&mut self) {
        if self.is_running() {
            log::warn!("file monitor is already running");
            return;
        }

        // Fresh flag per start; a thread detached by a timed-out `stop`
        // keeps the old one and stays signalled to exit.
        let running = Arc::new(AtomicBool::new(true));
        self.running = Arc::clone(&running);

        let store = self.store.clone();
        let scanner = self.scanner.clone();
        let interval = self.check_interval;
        let owner_user = self.owner_user.clone();
        let owner_host = self.owner_host.clone();

        self.handle = Some(thread::spawn(move || {
            let mut previous = Snapshot::new();
            while running.load(Ordering::SeqCst) {
                previous = run_iteration(&store, &scanner, &owner_user, &owner_host, previous);
                sleep_while_running(&running, interval);
            }
        }));

        log::info!(
            "file monitoring started (interval {}ms)",
            self.check_interval.as_millis()
        );
    }

    /// Signal the poll thread to end and wait for it, bounded by `max_wait`.
    ///
    /// Safe to call when not running. If the thread is mid-iteration past
    /// the bound it is detached; it re-checks the flag before sleeping
    /// again and exits on its own.
    pub fn stop(&mut self, max_wait: Duration) {
        self.running.store(false, Ordering::SeqCst);

        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + max_wait;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }

        if handle.is_finished() {
            let _ = handle.join();
            log::info!("file monitoring stopped");
        } else {
            log::warn!("file monitor did not stop within {:?}", max_wait);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Sleep up to `total`, waking early when the running flag clears.
fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let slice = Duration::from_millis(100);
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(slice));
    }
}
