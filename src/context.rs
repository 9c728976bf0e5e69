//! Lock directory resolution for vise.
//!
//! Every vise command operates on one lock directory, the shared folder
//! holding the `.lock` marker files. Resolution order:
//!
//! 1. the `--lock-dir` flag
//! 2. the `VISE_LOCKS_DIR` environment variable
//! 3. discovery: `./locks`, `$HOME/.vise/locks`, `{temp}/vise-locks`,
//!    taking the first candidate that can be created and passes a write
//!    probe.
//!
//! Explicit choices (flag, env var) are authoritative: when they are not
//! usable the command fails instead of silently drifting to a directory
//! that peer hosts are not watching.

use crate::config::Config;
use crate::error::{Result, ViseError};
use sha2::{Digest, Sha256};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the lock directory.
pub const LOCK_DIR_ENV: &str = "VISE_LOCKS_DIR";

/// Config file name inside the lock directory.
pub const CONFIG_FILE_NAME: &str = "vise.yaml";

/// Resolved lock directory for vise operations.
///
/// All commands resolve one of these up front and pass it down; nothing
/// else in the crate consults the environment for paths.
#[derive(Debug, Clone)]
pub struct LockDirContext {
    /// Directory holding the `.lock` marker files.
    pub lock_dir: PathBuf,
}

impl LockDirContext {
    /// Resolve the lock directory from an optional explicit path.
    ///
    /// # Returns
    ///
    /// * `Ok(LockDirContext)` - Successfully resolved context
    /// * `Err(ViseError::Io)` - If the explicit directory cannot be created
    ///   or written, or discovery finds no usable candidate
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            ensure_writable_dir(dir)?;
            return Ok(Self {
                lock_dir: dir.to_path_buf(),
            });
        }

        if let Ok(dir) = env::var(LOCK_DIR_ENV)
            && !dir.trim().is_empty()
        {
            let dir = PathBuf::from(dir);
            ensure_writable_dir(&dir)?;
            return Ok(Self { lock_dir: dir });
        }

        Self::discover()
    }

    /// Probe the discovery candidates and take the first usable one.
    fn discover() -> Result<Self> {
        for candidate in discovery_candidates() {
            if ensure_writable_dir(&candidate).is_ok() {
                log::debug!("discovered lock directory: {}", candidate.display());
                return Ok(Self {
                    lock_dir: candidate,
                });
            }
        }

        Err(ViseError::Io(format!(
            "no usable lock directory found; pass --lock-dir or set {}",
            LOCK_DIR_ENV
        )))
    }

    /// Get the path to the shared config file.
    pub fn config_path(&self) -> PathBuf {
        self.lock_dir.join(CONFIG_FILE_NAME)
    }

    /// Load the shared config, falling back to defaults when absent.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(self.config_path())
    }

    /// Get the PID file path for the background monitor of this directory.
    ///
    /// Keyed by a hash of the lock directory path so monitors for different
    /// directories on the same host use distinct PID files.
    pub fn pid_file_path(&self) -> PathBuf {
        let digest = Sha256::digest(self.lock_dir.to_string_lossy().as_bytes());
        let token = hex::encode(digest);
        env::temp_dir().join(format!("vise-monitor-{}.pid", &token[..8]))
    }
}

/// Discovery candidates, most specific first.
fn discovery_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join("locks"));
    }

    if let Some(home) = home_dir() {
        candidates.push(home.join(".vise").join("locks"));
    }

    candidates.push(env::temp_dir().join("vise-locks"));
    candidates
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Create the directory if needed and verify it accepts writes.
///
/// The write probe matters on network mounts where a directory can exist
/// and still reject creates for this user.
fn ensure_writable_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        ViseError::Io(format!(
            "cannot create lock directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let probe = dir.join(format!(".access_test_{}", std::process::id()));
    std::fs::write(&probe, b"test").map_err(|e| {
        ViseError::Io(format!(
            "lock directory '{}' is not writable: {}",
            dir.display(),
            e
        ))
    })?;
    let _ = std::fs::remove_file(&probe);

    Ok(())
}
