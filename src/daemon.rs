//! Background monitor lifecycle: a pid file plus signals.
//!
//! `start` spawns a detached `vise monitor` child against the resolved
//! lock directory and records its pid in a host-local file. `stop` reads
//! that file, sends SIGTERM and waits for the process table entry to
//! disappear. The pid file is advisory; a stale one (process gone) is
//! cleared on the next stop or overwritten by the next start.

use crate::context::LockDirContext;
use crate::error::{Result, ViseError};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How long `stop` waits for the monitor process to exit.
const STOP_WAIT: Duration = Duration::from_secs(5);

/// Monitor liveness as reported by the pid file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    NotRunning,
    Running(u32),
    /// A pid file exists but the process is gone.
    Stale(u32),
}

/// What `stop` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(u32),
    NotRunning,
    RemovedStalePidFile(u32),
}

pub fn status(ctx: &LockDirContext) -> MonitorStatus {
    let Some(pid) = read_pid_file(&ctx.pid_file_path()) else {
        return MonitorStatus::NotRunning;
    };

    if process_exists(pid) {
        MonitorStatus::Running(pid)
    } else {
        MonitorStatus::Stale(pid)
    }
}

/// Spawn a detached `vise monitor` child and record its pid.
pub fn start(ctx: &LockDirContext) -> Result<u32> {
    if let MonitorStatus::Running(pid) = status(ctx) {
        return Err(ViseError::UserError(format!(
            "monitor is already running (pid {})",
            pid
        )));
    }

    let exe = std::env::current_exe()
        .map_err(|e| ViseError::Io(format!("cannot resolve current executable: {}", e)))?;

    // The lock dir is passed explicitly so the child cannot re-discover a
    // different one.
    let child = Command::new(exe)
        .arg("--lock-dir")
        .arg(&ctx.lock_dir)
        .arg("monitor")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ViseError::Io(format!("failed to start monitor: {}", e)))?;

    let pid = child.id();
    write_pid_file(&ctx.pid_file_path(), pid)?;
    log::info!("monitor started (pid {})", pid);
    Ok(pid)
}

/// Terminate the recorded monitor process, bounded by [`STOP_WAIT`].
pub fn stop(ctx: &LockDirContext) -> Result<StopOutcome> {
    let pid_path = ctx.pid_file_path();

    let Some(pid) = read_pid_file(&pid_path) else {
        // Missing or unreadable; clear whatever is there.
        remove_pid_file(&pid_path);
        return Ok(StopOutcome::NotRunning);
    };

    if !process_exists(pid) {
        remove_pid_file(&pid_path);
        return Ok(StopOutcome::RemovedStalePidFile(pid));
    }

    let rc = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if rc != 0 {
        return Err(ViseError::Io(format!(
            "failed to signal monitor (pid {}): {}",
            pid,
            std::io::Error::last_os_error()
        )));
    }

    let deadline = Instant::now() + STOP_WAIT;
    while process_exists(pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }

    if process_exists(pid) {
        // Keep the pid file so a retry can find the process again.
        return Err(ViseError::Io(format!(
            "monitor (pid {}) did not exit within {:?}",
            pid, STOP_WAIT
        )));
    }

    remove_pid_file(&pid_path);
    log::info!("monitor stopped (pid {})", pid);
    Ok(StopOutcome::Stopped(pid))
}

fn process_exists(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

fn read_pid_file(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

fn write_pid_file(path: &Path, pid: u32) -> Result<()> {
    fs::write(path, pid.to_string()).map_err(|e| {
        ViseError::Io(format!(
            "cannot write pid file '{}': {}",
            path.display(),
            e
        ))
    })
}

fn remove_pid_file(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        log::warn!("could not remove pid file '{}': {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    // Larger than any real pid the kernel hands out.
    const DEAD_PID: u32 = 4_294_967_294;

    fn test_context() -> (TempDir, LockDirContext) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = LockDirContext {
            lock_dir: temp_dir.path().join("locks"),
        };
        (temp_dir, ctx)
    }

    #[test]
    fn test_pid_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("monitor.pid");

        write_pid_file(&path, 12345).unwrap();
        assert_eq!(read_pid_file(&path), Some(12345));

        remove_pid_file(&path);
        assert_eq!(read_pid_file(&path), None);
    }

    #[test]
    fn test_read_pid_file_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("monitor.pid");
        fs::write(&path, "not a pid").unwrap();

        assert_eq!(read_pid_file(&path), None);
    }

    #[test]
    fn test_remove_missing_pid_file_is_quiet() {
        remove_pid_file(&PathBuf::from("/nonexistent/dir/monitor.pid"));
    }

    #[test]
    fn test_status_without_pid_file() {
        let (_temp_dir, ctx) = test_context();
        assert_eq!(status(&ctx), MonitorStatus::NotRunning);
        let _ = fs::remove_file(ctx.pid_file_path());
    }

    #[test]
    fn test_status_reports_live_process() {
        let (_temp_dir, ctx) = test_context();
        // Our own pid is certainly alive.
        write_pid_file(&ctx.pid_file_path(), std::process::id()).unwrap();

        assert_eq!(status(&ctx), MonitorStatus::Running(std::process::id()));
        remove_pid_file(&ctx.pid_file_path());
    }

    #[test]
    fn test_status_reports_stale_pid() {
        let (_temp_dir, ctx) = test_context();
        write_pid_file(&ctx.pid_file_path(), DEAD_PID).unwrap();

        assert_eq!(status(&ctx), MonitorStatus::Stale(DEAD_PID));
        remove_pid_file(&ctx.pid_file_path());
    }

    #[test]
    fn test_stop_without_pid_file() {
        let (_temp_dir, ctx) = test_context();
        assert_eq!(stop(&ctx).unwrap(), StopOutcome::NotRunning);
    }

    #[test]
    fn test_stop_clears_stale_pid_file() {
        let (_temp_dir, ctx) = test_context();
        write_pid_file(&ctx.pid_file_path(), DEAD_PID).unwrap();

        assert_eq!(
            stop(&ctx).unwrap(),
            StopOutcome::RemovedStalePidFile(DEAD_PID)
        );
        assert!(!ctx.pid_file_path().exists());
    }

    #[test]
    fn test_stop_clears_garbage_pid_file() {
        let (_temp_dir, ctx) = test_context();
        fs::write(ctx.pid_file_path(), "garbage").unwrap();

        assert_eq!(stop(&ctx).unwrap(), StopOutcome::NotRunning);
        assert!(!ctx.pid_file_path().exists());
    }

    #[test]
    fn test_process_exists_for_own_pid() {
        assert!(process_exists(std::process::id()));
        assert!(!process_exists(DEAD_PID));
    }
}
