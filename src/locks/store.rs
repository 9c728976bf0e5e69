//! Lock store: owns the lock directory and its conflict, ownership, and
//! staleness rules.
//!
//! Every operation here is a read-modify-write over a single marker file.
//! There is no cross-process mutual exclusion beyond the filesystem's own
//! guarantees: exclusive create arbitrates racing creators on one host,
//! and atomic rename keeps heartbeat rewrites tear-free, but two hosts
//! racing on a network share can still lose updates. That is an accepted
//! property of advisory, filesystem-mediated coordination.
//!
//! Staleness is measured one way everywhere: hours since the last
//! heartbeat, falling back to the creation time for markers that have
//! never been refreshed.

use super::record::{self, DetectionMethod, LockRecord};
use crate::config::{self, Config};
use crate::error::{Result, ViseError};
use crate::fs::atomic_write;
use chrono::{Duration, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Store over one lock directory.
#[derive(Debug, Clone)]
pub struct LockStore {
    lock_dir: PathBuf,
    extensions: Vec<String>,
    stale_after: Duration,
}

impl LockStore {
    /// Create a store over `lock_dir` with policy taken from `config`.
    pub fn new<P: AsRef<Path>>(lock_dir: P, config: &Config) -> Self {
        Self {
            lock_dir: lock_dir.as_ref().to_path_buf(),
            extensions: config.normalized_extensions(),
            stale_after: Duration::hours(i64::from(config.stale_after_hours)),
        }
    }

    /// Directory holding the markers.
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Marker file path for a target path.
    pub fn marker_path(&self, target_path: &str) -> PathBuf {
        self.lock_dir.join(record::marker_file_name(target_path))
    }

    /// Create a lock on `target_path` for `owner_user`.
    ///
    /// Exclusive create closes the check-then-write gap for creators on one
    /// host. Losing the race surfaces as an occupied slot, and the occupant
    /// decides the outcome: a fresh record means `Conflict`, a stale or
    /// corrupt one is evicted and the create retried.
    ///
    /// # Returns
    ///
    /// * `Ok(LockRecord)` - The newly persisted record
    /// * `Err(ViseError::UnsupportedFile)` - Extension not in the CAD set
    /// * `Err(ViseError::Conflict)` - A live lock is held by someone else
    /// * `Err(ViseError::Io)` - The marker could not be written
    pub fn create_lock(
        &self,
        target_path: &str,
        owner_user: &str,
        owner_host: &str,
        process_id: Option<u32>,
        auto_created: bool,
        detection_method: DetectionMethod,
    ) -> Result<LockRecord> {
        if !config::has_cad_extension(target_path, &self.extensions) {
            return Err(ViseError::UnsupportedFile(target_path.to_string()));
        }

        self.ensure_dir()?;
        let marker = self.marker_path(target_path);

        let record = LockRecord::new(
            target_path,
            owner_user,
            owner_host,
            process_id,
            auto_created,
            detection_method,
        );
        let content = record.encode()?;

        let mut attempts = 0;
        loop {
            if self.try_exclusive_create(&marker, content.as_bytes())? {
                log::info!(
                    "created {} lock for '{}' by {}",
                    detection_method,
                    target_path,
                    owner_user
                );
                return Ok(record);
            }

            attempts += 1;
            if attempts > 2 {
                return Err(ViseError::Io(format!(
                    "lock marker for '{}' is contended; try again",
                    target_path
                )));
            }

            match self.read_marker(&marker) {
                Ok(Some(existing)) => {
                    if existing.is_stale(Utc::now(), self.stale_after) {
                        log::warn!(
                            "removing stale lock for '{}' held by {}",
                            target_path,
                            existing.owner_user
                        );
                        self.delete_marker(&marker)?;
                    } else {
                        return Err(ViseError::Conflict {
                            owner_user: existing.owner_user,
                            owner_host: existing.owner_host,
                        });
                    }
                }
                // Vanished between the create attempt and the read; the
                // slot is free again.
                Ok(None) => {}
                Err(ViseError::Corrupt(detail)) => {
                    log::warn!(
                        "removing corrupt lock marker for '{}': {}",
                        target_path,
                        detail
                    );
                    self.delete_marker(&marker)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove the lock on `target_path`, verifying ownership.
    ///
    /// Returns the removed record.
    ///
    /// # Returns
    ///
    /// * `Ok(LockRecord)` - The record that was removed
    /// * `Err(ViseError::NotFound)` - No marker exists for the path
    /// * `Err(ViseError::NotOwner)` - The lock belongs to someone else
    pub fn remove_lock(&self, target_path: &str, requesting_user: &str) -> Result<LockRecord> {
        let marker = self.marker_path(target_path);

        let record = match self.read_marker(&marker) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(ViseError::NotFound(target_path.to_string())),
            Err(ViseError::Corrupt(detail)) => {
                // An unreadable marker cannot prove ownership; heal it and
                // report the path as unlocked.
                log::warn!(
                    "removing corrupt lock marker for '{}': {}",
                    target_path,
                    detail
                );
                self.delete_marker(&marker)?;
                return Err(ViseError::NotFound(target_path.to_string()));
            }
            Err(e) => return Err(e),
        };

        if record.owner_user != requesting_user {
            return Err(ViseError::NotOwner {
                owner: record.owner_user,
                requested: requesting_user.to_string(),
            });
        }

        self.delete_marker(&marker)?;
        log::info!("removed lock for '{}' by {}", target_path, requesting_user);
        Ok(record)
    }

    /// Check whether `target_path` is locked.
    ///
    /// Stale and corrupt markers found here are evicted and reported as
    /// unlocked.
    pub fn check_lock(&self, target_path: &str) -> Result<Option<LockRecord>> {
        let marker = self.marker_path(target_path);

        let record = match self.read_marker(&marker) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(ViseError::Corrupt(detail)) => {
                log::warn!(
                    "removing corrupt lock marker for '{}': {}",
                    target_path,
                    detail
                );
                self.delete_marker(&marker)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if record.is_stale(Utc::now(), self.stale_after) {
            log::warn!(
                "evicting stale lock for '{}' held by {}",
                target_path,
                record.owner_user
            );
            self.delete_marker(&marker)?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// List all live locks, sorted by target path.
    ///
    /// Corrupt and stale markers encountered during the walk are evicted
    /// and excluded from the result.
    pub fn list_locks(&self) -> Result<Vec<LockRecord>> {
        let now = Utc::now();
        let mut records = Vec::new();

        for marker in self.marker_paths()? {
            match self.read_marker(&marker) {
                Ok(Some(record)) => {
                    if record.is_stale(now, self.stale_after) {
                        log::warn!("evicting stale lock marker '{}'", marker.display());
                        self.delete_marker(&marker)?;
                    } else {
                        records.push(record);
                    }
                }
                Ok(None) => {}
                Err(ViseError::Corrupt(detail)) => {
                    log::warn!(
                        "removing corrupt lock marker '{}': {}",
                        marker.display(),
                        detail
                    );
                    self.delete_marker(&marker)?;
                }
                Err(e) => return Err(e),
            }
        }

        records.sort_by(|a, b| a.target_path.cmp(&b.target_path));
        Ok(records)
    }

    /// Delete every marker stale at a caller-chosen age, in hours.
    ///
    /// This is the one operation with an explicit threshold; the other read
    /// paths use the configured default. Corrupt markers are always swept
    /// and counted. Returns the number of markers deleted.
    pub fn sweep_stale(&self, max_age_hours: f64) -> Result<usize> {
        let threshold = Duration::milliseconds((max_age_hours * 3_600_000.0) as i64);
        let now = Utc::now();
        let mut removed = 0usize;

        for marker in self.marker_paths()? {
            match self.read_marker(&marker) {
                Ok(Some(record)) => {
                    if record.is_stale(now, threshold) {
                        self.delete_marker(&marker)?;
                        removed += 1;
                        log::info!("swept stale lock marker '{}'", marker.display());
                    }
                }
                Ok(None) => {}
                Err(ViseError::Corrupt(detail)) => {
                    self.delete_marker(&marker)?;
                    removed += 1;
                    log::warn!(
                        "swept corrupt lock marker '{}': {}",
                        marker.display(),
                        detail
                    );
                }
                Err(e) => return Err(e),
            }
        }

        log::info!("cleaned up {} stale locks", removed);
        Ok(removed)
    }

    /// Delete every lock owned by `owner_user`, regardless of staleness.
    ///
    /// Corrupt markers are healed along the way but not counted; ownership
    /// cannot be established for them. Returns the number removed.
    pub fn remove_all_for_user(&self, owner_user: &str) -> Result<usize> {
        let mut removed = 0usize;

        for marker in self.marker_paths()? {
            match self.read_marker(&marker) {
                Ok(Some(record)) if record.owner_user == owner_user => {
                    self.delete_marker(&marker)?;
                    removed += 1;
                    log::info!(
                        "removed lock '{}' for user {}",
                        marker.display(),
                        owner_user
                    );
                }
                Ok(_) => {}
                Err(ViseError::Corrupt(detail)) => {
                    log::warn!(
                        "removing corrupt lock marker '{}': {}",
                        marker.display(),
                        detail
                    );
                    self.delete_marker(&marker)?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }

    /// Refresh the heartbeat timestamp on an owned lock.
    ///
    /// `last_seen_at` only moves forward; `created_at`, `lock_id`, and
    /// ownership never change. The marker is rewritten atomically so
    /// readers never observe a torn record. Returns the updated record.
    pub fn heartbeat(&self, target_path: &str, requesting_user: &str) -> Result<LockRecord> {
        let marker = self.marker_path(target_path);

        let mut record = match self.read_marker(&marker) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(ViseError::NotFound(target_path.to_string())),
            Err(ViseError::Corrupt(detail)) => {
                log::warn!(
                    "removing corrupt lock marker for '{}': {}",
                    target_path,
                    detail
                );
                self.delete_marker(&marker)?;
                return Err(ViseError::NotFound(target_path.to_string()));
            }
            Err(e) => return Err(e),
        };

        if record.owner_user != requesting_user {
            return Err(ViseError::NotOwner {
                owner: record.owner_user,
                requested: requesting_user.to_string(),
            });
        }

        record.last_seen_at = Some(Utc::now().max(record.last_activity_at()));

        let content = record.encode()?;
        atomic_write(&marker, content.as_bytes())?;

        Ok(record)
    }

    /// Attempt an exclusive create of `marker` with `content`.
    ///
    /// Returns `false` when a marker already exists at that path. A write
    /// or sync failure removes the partial file before reporting.
    fn try_exclusive_create(&self, marker: &Path, content: &[u8]) -> Result<bool> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(marker) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(ViseError::Io(format!(
                    "failed to create lock marker '{}': {}",
                    marker.display(),
                    e
                )));
            }
        };

        file.write_all(content).map_err(|e| {
            let _ = fs::remove_file(marker);
            ViseError::Io(format!(
                "failed to write lock marker '{}': {}",
                marker.display(),
                e
            ))
        })?;

        file.sync_all().map_err(|e| {
            let _ = fs::remove_file(marker);
            ViseError::Io(format!(
                "failed to sync lock marker '{}': {}",
                marker.display(),
                e
            ))
        })?;

        Ok(true)
    }

    /// Read and decode the marker at `path`.
    ///
    /// Absence is `Ok(None)`; unparseable content is `Err(Corrupt)` so each
    /// caller can decide how to heal.
    fn read_marker(&self, path: &Path) -> Result<Option<LockRecord>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ViseError::Io(format!(
                    "failed to read lock marker '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        LockRecord::decode(&content).map(Some)
    }

    /// Delete the marker at `path`, treating absence as success.
    fn delete_marker(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ViseError::Io(format!(
                "failed to remove lock marker '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    /// All `.lock` marker paths currently in the directory, sorted.
    fn marker_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.lock_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ViseError::Io(format!(
                    "failed to read lock directory '{}': {}",
                    self.lock_dir.display(),
                    e
                )));
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| ViseError::Io(format!("failed to read lock directory entry: {}", e)))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("lock") {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Create the lock directory if missing.
    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.lock_dir).map_err(|e| {
            ViseError::Io(format!(
                "failed to create lock directory '{}': {}",
                self.lock_dir.display(),
                e
            ))
        })
    }
}
