//! The `monitor` command: foreground reconciliation loop.

use crate::cli::MonitorArgs;
use crate::context::LockDirContext;
use crate::error::Result;
use crate::identity;
use crate::locks::LockStore;
use crate::monitor::{run_iteration, ProcessScanner, Snapshot};
use std::thread;
use std::time::Duration;

/// Floor for the poll interval; a tighter loop would just burn CPU
/// re-reading procfs.
const MIN_INTERVAL_MS: u64 = 50;

pub fn cmd_monitor(ctx: &LockDirContext, args: MonitorArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let store = LockStore::new(&ctx.lock_dir, &config);
    let scanner = ProcessScanner::new(&config);
    let user = identity::owner_user();
    let host = identity::owner_host();

    let interval_ms = args
        .interval_ms
        .unwrap_or(config.check_interval_ms)
        .max(MIN_INTERVAL_MS);

    if args.once {
        run_iteration(&store, &scanner, &user, &host, Snapshot::new());
        return Ok(());
    }

    log::info!(
        "monitoring CAD processes every {}ms as {} on {}",
        interval_ms,
        user,
        host
    );
    println!(
        "Monitoring CAD processes (interval {}ms). Press Ctrl-C to stop.",
        interval_ms
    );

    let mut previous = Snapshot::new();
    loop {
        previous = run_iteration(&store, &scanner, &user, &host, previous);
        thread::sleep(Duration::from_millis(interval_ms));
    }
}
