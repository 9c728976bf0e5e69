//! Lock analytics: summary statistics derived from a full lock listing.
//!
//! Purely a read-side fold over records already in memory; no I/O and no
//! clock access, which keeps it directly testable. The inactivity
//! threshold here is a reporting knob, independent of the store's
//! eviction threshold.

use super::record::LockRecord;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Auto-created versus manually created lock counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoVsManual {
    pub auto: usize,
    pub manual: usize,
}

/// Summary statistics over a set of lock records.
#[derive(Debug, Clone, Serialize)]
pub struct LockAnalytics {
    /// Total number of live locks.
    pub total_locks: usize,

    /// Distinct owning users, sorted.
    pub active_users: Vec<String>,

    /// Histogram of detection methods.
    pub detection_methods: BTreeMap<String, usize>,

    /// Counts of auto-detected versus manual locks.
    pub auto_vs_manual: AutoVsManual,

    /// Age of each lock in hours since creation.
    pub lock_ages_hours: Vec<f64>,

    /// Mean of `lock_ages_hours`, `0.0` when there are no locks.
    pub average_lock_age_hours: f64,

    /// Locks whose last heartbeat is older than the inactivity threshold.
    pub stale_locks: usize,
}

/// Fold `records` into summary statistics as of `now`.
///
/// `inactive_threshold` controls only the `stale_locks` count.
pub fn summarize(
    records: &[LockRecord],
    now: DateTime<Utc>,
    inactive_threshold: Duration,
) -> LockAnalytics {
    let mut users = BTreeSet::new();
    let mut detection_methods: BTreeMap<String, usize> = BTreeMap::new();
    let mut auto_vs_manual = AutoVsManual::default();
    let mut lock_ages_hours = Vec::with_capacity(records.len());
    let mut stale_locks = 0usize;

    for record in records {
        users.insert(record.owner_user.clone());

        *detection_methods
            .entry(record.detection_method.as_str().to_string())
            .or_insert(0) += 1;

        if record.auto_created {
            auto_vs_manual.auto += 1;
        } else {
            auto_vs_manual.manual += 1;
        }

        lock_ages_hours.push(record.age_hours(now));

        if record.is_stale(now, inactive_threshold) {
            stale_locks += 1;
        }
    }

    let average_lock_age_hours = if lock_ages_hours.is_empty() {
        0.0
    } else {
        lock_ages_hours.iter().sum::<f64>() / lock_ages_hours.len() as f64
    };

    LockAnalytics {
        total_locks: records.len(),
        active_users: users.into_iter().collect(),
        detection_methods,
        auto_vs_manual,
        lock_ages_hours,
        average_lock_age_hours,
        stale_locks,
    }
}
