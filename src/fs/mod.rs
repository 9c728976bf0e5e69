//! Filesystem utilities for vise.
//!
//! Atomic writes keep marker rewrites crash-safe: another host scanning the
//! lock directory either sees the old marker or the new one, never a torn
//! write.

pub mod atomic;

pub use atomic::atomic_write;
