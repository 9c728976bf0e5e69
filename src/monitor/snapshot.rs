//! Process-file snapshots: which recognized CAD processes currently hold
//! which CAD files open.
//!
//! Snapshots are read from procfs. The scanner takes an explicit proc
//! root so tests can point it at a fabricated tree instead of the live
//! `/proc`.

use crate::config::{self, Config};
use crate::error::{Result, ViseError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Mapping from process id to the CAD file paths it has open.
///
/// Replaced wholesale each poll cycle; never persisted.
pub type Snapshot = BTreeMap<u32, BTreeSet<String>>;

/// Scanner over one procfs tree.
#[derive(Debug, Clone)]
pub struct ProcessScanner {
    proc_root: PathBuf,
    process_names: Vec<String>,
    extensions: Vec<String>,
}

impl ProcessScanner {
    /// Scanner over the live `/proc` with policy from `config`.
    pub fn new(config: &Config) -> Self {
        Self::with_proc_root("/proc", config)
    }

    /// Scanner over an alternate procfs root, for tests.
    pub fn with_proc_root<P: AsRef<Path>>(proc_root: P, config: &Config) -> Self {
        Self {
            proc_root: proc_root.as_ref().to_path_buf(),
            process_names: config.processes.clone(),
            extensions: config.normalized_extensions(),
        }
    }

    /// Case-insensitive membership test against the process allow-list.
    pub fn is_recognized_process(&self, name: &str) -> bool {
        self.process_names
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name))
    }

    /// Extension membership test, the same set the lock store enforces.
    pub fn is_cad_file(&self, path: &str) -> bool {
        config::has_cad_extension(path, &self.extensions)
    }

    /// Capture which recognized processes currently hold CAD files open.
    ///
    /// A recognized process with no CAD files open appears with an empty
    /// set, so its later file-opens still diff against something.
    /// Processes that vanish or deny access mid-inspection are skipped;
    /// those races are routine on a live system.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let entries = fs::read_dir(&self.proc_root).map_err(|e| {
            ViseError::Io(format!(
                "cannot read process table '{}': {}",
                self.proc_root.display(),
                e
            ))
        })?;

        let mut snapshot = Snapshot::new();

        for entry in entries {
            let Ok(entry) = entry else { continue };

            // Only numeric directories are PID entries.
            let name = entry.file_name();
            let Ok(pid) = name.to_string_lossy().parse::<u32>() else {
                continue;
            };

            let Some(comm) = self.read_comm(pid) else {
                continue;
            };
            if !self.is_recognized_process(&comm) {
                continue;
            }

            snapshot.insert(pid, self.open_cad_files(pid));
        }

        Ok(snapshot)
    }

    /// Process name from `{proc_root}/{pid}/comm`.
    fn read_comm(&self, pid: u32) -> Option<String> {
        let path = self.proc_root.join(pid.to_string()).join("comm");
        fs::read_to_string(path).ok().map(|s| s.trim().to_string())
    }

    /// CAD files among the process's open descriptors.
    fn open_cad_files(&self, pid: u32) -> BTreeSet<String> {
        let fd_dir = self.proc_root.join(pid.to_string()).join("fd");

        // Permission denied or the process already exited: no files.
        let Ok(entries) = fs::read_dir(&fd_dir) else {
            return BTreeSet::new();
        };

        let mut files = BTreeSet::new();
        for entry in entries.flatten() {
            // Descriptors are symlinks; non-file targets (sockets, pipes)
            // do not parse as CAD paths and fall out of the filter.
            let Ok(target) = fs::read_link(entry.path()) else {
                continue;
            };
            let path = target.to_string_lossy().to_string();
            if self.is_cad_file(&path) {
                files.insert(path);
            }
        }

        files
    }
}
