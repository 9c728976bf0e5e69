//! Exit code constants for the vise CLI.
//!
//! Every error variant maps to one of these codes so scripts wrapping the
//! CLI can distinguish "the file is locked by someone else" from "you do not
//! own that lock" without parsing stderr:
//! - 0: Success
//! - 1: User error (bad args, invalid config, unsupported file)
//! - 2: Conflict (an unexpired lock is held by another principal)
//! - 3: Not found (no lock exists for the target)
//! - 4: Not owner (lock belongs to a different user)
//! - 5: I/O failure (marker read/write/delete failed)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config, or an unsupported file type.
pub const USER_ERROR: i32 = 1;

/// Conflict: an unexpired lock is already held by another user.
pub const CONFLICT: i32 = 2;

/// Not found: no lock marker exists for the target path.
pub const NOT_FOUND: i32 = 3;

/// Not owner: the lock belongs to a different user.
pub const NOT_OWNER: i32 = 4;

/// I/O failure: the underlying marker read/write/delete failed.
pub const IO_FAILURE: i32 = 5;
