//! Command implementations for vise.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Small commands live here; the monitor loop and the
//! HTTP server have their own modules.

mod monitor;
mod serve;

use crate::cli::{
    CheckArgs, CleanupArgs, Command, HeartbeatArgs, LockArgs, UnlockAllArgs, UnlockArgs,
};
use crate::context::LockDirContext;
use crate::daemon::{self, MonitorStatus, StopOutcome};
use crate::error::{Result, ViseError};
use crate::identity;
use crate::locks::{summarize, DetectionMethod, LockStore};
use chrono::Utc;
use std::path::PathBuf;

/// Dispatch a command to its implementation.
///
/// Resolves the lock directory once; every command operates on the same
/// resolved context.
pub fn dispatch(lock_dir: Option<PathBuf>, command: Command) -> Result<()> {
    let ctx = LockDirContext::resolve(lock_dir.as_deref())?;

    match command {
        Command::Lock(args) => cmd_lock(&ctx, args),
        Command::Unlock(args) => cmd_unlock(&ctx, args),
        Command::Check(args) => cmd_check(&ctx, args),
        Command::List => cmd_list(&ctx),
        Command::Stats => cmd_stats(&ctx),
        Command::Cleanup(args) => cmd_cleanup(&ctx, args),
        Command::UnlockAll(args) => cmd_unlock_all(&ctx, args),
        Command::Heartbeat(args) => cmd_heartbeat(&ctx, args),
        Command::Monitor(args) => monitor::cmd_monitor(&ctx, args),
        Command::Start => cmd_start(&ctx),
        Command::Stop => cmd_stop(&ctx),
        Command::Status => cmd_status(&ctx),
        Command::Serve(args) => serve::cmd_serve(&ctx, args),
    }
}

fn open_store(ctx: &LockDirContext) -> Result<LockStore> {
    let config = ctx.load_config()?;
    Ok(LockStore::new(&ctx.lock_dir, &config))
}

fn cmd_lock(ctx: &LockDirContext, args: LockArgs) -> Result<()> {
    let store = open_store(ctx)?;
    let user = args.user.unwrap_or_else(identity::owner_user);
    let host = identity::owner_host();

    let record = store.create_lock(
        &args.file,
        &user,
        &host,
        args.process_id,
        false,
        DetectionMethod::Manual,
    )?;

    println!("Locked {}", record.target_path);
    println!("  Owner:      {} on {}", record.owner_user, record.owner_host);
    println!("  Lock ID:    {}", record.lock_id);
    Ok(())
}

fn cmd_unlock(ctx: &LockDirContext, args: UnlockArgs) -> Result<()> {
    let store = open_store(ctx)?;
    let user = args.user.unwrap_or_else(identity::owner_user);

    let record = store.remove_lock(&args.file, &user)?;

    println!("Unlocked {}", record.target_path);
    println!("  Was held:   {}", record.age_string());
    Ok(())
}

fn cmd_check(ctx: &LockDirContext, args: CheckArgs) -> Result<()> {
    let store = open_store(ctx)?;

    match store.check_lock(&args.file)? {
        Some(record) => {
            println!("{} is locked", record.target_path);
            println!("  Owner:      {} on {}", record.owner_user, record.owner_host);
            println!(
                "  Since:      {}",
                record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Age:        {}", record.age_string());
            println!("  Method:     {}", record.detection_method);
            if let Some(pid) = record.process_id {
                println!("  PID:        {}", pid);
            }
        }
        None => println!("{} is not locked", args.file),
    }
    Ok(())
}

fn cmd_list(ctx: &LockDirContext) -> Result<()> {
    let store = open_store(ctx)?;
    let locks = store.list_locks()?;

    if locks.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    println!("Active locks ({}):", locks.len());
    println!();

    for record in &locks {
        println!("  {}:", record.target_path);
        println!("    Owner:      {} on {}", record.owner_user, record.owner_host);
        println!(
            "    Created:    {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("    Age:        {}", record.age_string());
        println!("    Method:     {}", record.detection_method);
        if let Some(pid) = record.process_id {
            println!("    PID:        {}", pid);
        }
        println!();
    }

    Ok(())
}

fn cmd_stats(ctx: &LockDirContext) -> Result<()> {
    let config = ctx.load_config()?;
    let store = LockStore::new(&ctx.lock_dir, &config);
    let locks = store.list_locks()?;

    let analytics = summarize(
        &locks,
        Utc::now(),
        chrono::Duration::hours(i64::from(config.inactive_after_hours)),
    );

    println!("Lock statistics:");
    println!("  Total locks:    {}", analytics.total_locks);
    println!(
        "  Active users:   {}",
        if analytics.active_users.is_empty() {
            "-".to_string()
        } else {
            analytics.active_users.join(", ")
        }
    );
    println!(
        "  Auto / manual:  {} / {}",
        analytics.auto_vs_manual.auto, analytics.auto_vs_manual.manual
    );
    println!("  Average age:    {:.1}h", analytics.average_lock_age_hours);
    println!(
        "  Inactive:       {} (no activity for {}h)",
        analytics.stale_locks, config.inactive_after_hours
    );

    if !analytics.detection_methods.is_empty() {
        println!("  By method:");
        for (method, count) in &analytics.detection_methods {
            println!("    {:<10} {}", method, count);
        }
    }

    Ok(())
}

fn cmd_cleanup(ctx: &LockDirContext, args: CleanupArgs) -> Result<()> {
    if args.max_age_hours < 0.0 || !args.max_age_hours.is_finite() {
        return Err(ViseError::UserError(
            "--max-age-hours must be a non-negative number".to_string(),
        ));
    }

    let store = open_store(ctx)?;
    let count = store.sweep_stale(args.max_age_hours)?;

    println!("Cleaned up {} stale locks", count);
    Ok(())
}

fn cmd_unlock_all(ctx: &LockDirContext, args: UnlockAllArgs) -> Result<()> {
    let store = open_store(ctx)?;
    let user = args.user.unwrap_or_else(identity::owner_user);

    let count = store.remove_all_for_user(&user)?;

    println!("Removed {} locks for {}", count, user);
    Ok(())
}

fn cmd_heartbeat(ctx: &LockDirContext, args: HeartbeatArgs) -> Result<()> {
    let store = open_store(ctx)?;
    let user = args.user.unwrap_or_else(identity::owner_user);

    let record = store.heartbeat(&args.file, &user)?;

    println!("Heartbeat recorded for {}", record.target_path);
    if let Some(seen) = record.last_seen_at {
        println!("  Last seen:  {}", seen.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

fn cmd_start(ctx: &LockDirContext) -> Result<()> {
    if let MonitorStatus::Running(pid) = daemon::status(ctx) {
        println!("Monitor already running (pid {})", pid);
        return Ok(());
    }

    let pid = daemon::start(ctx)?;
    println!("Monitor started (pid {})", pid);
    Ok(())
}

fn cmd_stop(ctx: &LockDirContext) -> Result<()> {
    match daemon::stop(ctx)? {
        StopOutcome::Stopped(pid) => println!("Monitor stopped (pid {})", pid),
        StopOutcome::NotRunning => println!("Monitor is not running"),
        StopOutcome::RemovedStalePidFile(pid) => {
            println!("Monitor is not running (removed stale pid file for pid {})", pid)
        }
    }
    Ok(())
}

fn cmd_status(ctx: &LockDirContext) -> Result<()> {
    match daemon::status(ctx) {
        MonitorStatus::Running(pid) => println!("Monitor is running (pid {})", pid),
        MonitorStatus::NotRunning => println!("Monitor is not running"),
        MonitorStatus::Stale(pid) => {
            println!("Monitor is not running (stale pid file for pid {})", pid)
        }
    }
    Ok(())
}
