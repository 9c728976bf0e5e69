//! Locking subsystem for vise.
//!
//! Advisory locks over CAD files on a shared directory:
//! - one sidecar `.lock` marker per locked file, named
//!   `{16-hex path hash}_{sanitized file name}.lock`
//! - marker contents are field-tagged JSON (see [`record`])
//! - deleting a marker is equivalent to unlocking; an empty or absent
//!   directory means no locks exist
//!
//! # Concurrency
//!
//! Locks are advisory and best-effort. Exclusive create arbitrates racing
//! creators on one host, and atomic rename keeps heartbeat rewrites
//! tear-free, but writers on different hosts sharing the directory over a
//! network filesystem can still race. The design accepts lost-update and
//! duplicate-creation windows rather than attempting distributed locking.

pub mod analytics;
pub mod record;
mod store;

#[cfg(test)]
mod tests;

// Re-export public API
pub use analytics::{AutoVsManual, LockAnalytics, summarize};
pub use record::{DetectionMethod, LockRecord};
pub use store::LockStore;
