//! Automatic lock management driven by process observation.
//!
//! The monitor polls the process table for recognized CAD applications,
//! snapshots which CAD files each one has open, and reconciles the
//! differences against the lock store: opened files gain auto-created
//! locks under the monitor's own identity, closed files (or files whose
//! process terminated) have those locks released.
//!
//! The monitor is deliberately best-effort. It cannot release locks it
//! does not own, and a scan that fails half-way simply retries on the
//! next interval against the last good snapshot.

pub mod reconcile;
pub mod snapshot;

pub use reconcile::{diff_snapshots, run_iteration, FileMonitor, SnapshotDiff, DEFAULT_STOP_WAIT};
pub use snapshot::{ProcessScanner, Snapshot};
