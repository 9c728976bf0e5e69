//! Lock record model and on-disk codec.
//!
//! A lock record is one advisory claim on one CAD file, stored as pretty
//! JSON in a sidecar `.lock` marker. The format is field-tagged so readers
//! on older versions can still extract the fields they know; unknown fields
//! are ignored on decode. Structurally invalid input fails closed, and read
//! paths treat that as "corrupt, evict".
//!
//! This module also owns the marker naming scheme: the mapping from an
//! arbitrary CAD file path to a filesystem-safe marker name. Nothing here
//! touches the filesystem.

use crate::error::{Result, ViseError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How a lock came into existence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Created explicitly by a user command or API call.
    #[default]
    Manual,
    /// Created by the monitor after seeing the file open in a CAD process.
    Auto,
    /// Inferred from a CAD application's temporary working file.
    TempFile,
}

impl DetectionMethod {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Manual => "manual",
            DetectionMethod::Auto => "auto",
            DetectionMethod::TempFile => "temp_file",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advisory claim on one CAD file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    /// The CAD file's path as observed by the claimant.
    ///
    /// Not canonicalized: different hosts may see the same file under
    /// different mount points, and the marker name derived from this exact
    /// string is what arbitrates.
    pub target_path: String,

    /// File name only, for display.
    pub display_name: String,

    /// User who holds the lock.
    pub owner_user: String,

    /// Computer the lock was created on.
    pub owner_host: String,

    /// When the lock was created (RFC3339).
    pub created_at: DateTime<Utc>,

    /// Last heartbeat (RFC3339).
    ///
    /// Markers written by older versions may omit this; staleness checks
    /// fall back to `created_at` via [`LockRecord::last_activity_at`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,

    /// Unique identifier generated at creation, never rewritten.
    pub lock_id: String,

    /// Process ID of the owning CAD application, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,

    /// True when the monitor created this lock rather than a user.
    pub auto_created: bool,

    /// How the lock was detected.
    pub detection_method: DetectionMethod,

    /// Hash of `target_path` (not of file content), a collision-avoidance
    /// aid for tooling that indexes markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_hash: Option<String>,
}

impl LockRecord {
    /// Create a new record for `target_path` with the current timestamp.
    pub fn new(
        target_path: &str,
        owner_user: &str,
        owner_host: &str,
        process_id: Option<u32>,
        auto_created: bool,
        detection_method: DetectionMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            target_path: target_path.to_string(),
            display_name: display_name(target_path),
            owner_user: owner_user.to_string(),
            owner_host: owner_host.to_string(),
            created_at: now,
            last_seen_at: Some(now),
            lock_id: generate_lock_id(target_path, now),
            process_id,
            auto_created,
            detection_method,
            path_hash: Some(path_hash(target_path)),
        }
    }

    /// Serialize to the on-disk marker format (pretty JSON).
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ViseError::Io(format!("failed to serialize lock record: {}", e)))
    }

    /// Parse a marker's contents.
    ///
    /// Unknown fields are ignored for forward compatibility; anything
    /// structurally invalid is an error, never a partial record.
    pub fn decode(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ViseError::Corrupt(e.to_string()))
    }

    /// Timestamp of the most recent activity on this lock.
    ///
    /// `last_seen_at` when present and not behind `created_at`, otherwise
    /// `created_at`. This is the single staleness clock used everywhere.
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        match self.last_seen_at {
            Some(seen) if seen > self.created_at => seen,
            _ => self.created_at,
        }
    }

    /// Check if the lock is stale at `now` given an inactivity threshold.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now.signed_duration_since(self.last_activity_at()) > threshold
    }

    /// Age in fractional hours at `now`, measured from creation.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(self.created_at, now)
    }

    /// Hours without a heartbeat at `now`.
    pub fn inactive_hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(self.last_activity_at(), now)
    }

    /// Format the lock's age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = Utc::now().signed_duration_since(self.created_at);
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }
}

fn hours_between(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(start).num_seconds() as f64 / 3600.0
}

/// Marker file name for `target_path`: `{lock_key}.lock`.
pub fn marker_file_name(target_path: &str) -> String {
    format!("{}.lock", lock_key(target_path))
}

/// Deterministic filesystem-safe key for `target_path`.
///
/// The key is `{16-hex-char hash}_{sanitized file name}`. The hash prefix
/// covers the full original path, so two different paths whose sanitized
/// basenames collide still map to distinct markers.
pub fn lock_key(target_path: &str) -> String {
    let digest = hex::encode(Sha256::digest(target_path.as_bytes()));
    format!(
        "{}_{}",
        &digest[..16],
        sanitize_file_name(&display_name(target_path))
    )
}

/// Replace characters that are illegal in file names on any supported OS
/// (and spaces) with underscores.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            other => other,
        })
        .collect()
}

/// File name component of `target_path`, tolerating Windows separators
/// recorded by other hosts.
pub fn display_name(target_path: &str) -> String {
    target_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(target_path)
        .to_string()
}

/// Full hash of the original path string (not of file content).
pub fn path_hash(target_path: &str) -> String {
    hex::encode(Sha256::digest(target_path.as_bytes()))
}

fn generate_lock_id(target_path: &str, created_at: DateTime<Utc>) -> String {
    let nanos = created_at.timestamp_nanos_opt().unwrap_or_default();
    let digest = Sha256::digest(format!("{}{}", target_path, nanos).as_bytes());
    hex::encode(&digest[..16])
}
