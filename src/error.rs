//! Error types for the vise CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error
//! messages. Expected lock outcomes (conflict, not found, not owner) are
//! ordinary values of this enum, not panics or retries: the store returns
//! them, and the CLI and HTTP façade translate them into exit codes and
//! status codes.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for vise operations.
#[derive(Error, Debug)]
pub enum ViseError {
    /// User provided invalid arguments or the environment is misconfigured.
    #[error("{0}")]
    UserError(String),

    /// The target path's extension is not a recognized CAD format.
    #[error("'{0}' is not a supported CAD file")]
    UnsupportedFile(String),

    /// An unexpired lock is already held by another principal.
    #[error("file is locked by {owner_user} on {owner_host}")]
    Conflict {
        owner_user: String,
        owner_host: String,
    },

    /// No lock marker exists for the target path.
    #[error("no lock found for '{0}'")]
    NotFound(String),

    /// The lock belongs to a different user than the requester.
    #[error("lock belongs to {owner}, not {requested}")]
    NotOwner { owner: String, requested: String },

    /// A marker file exists but fails to decode.
    ///
    /// Read paths self-heal corrupt markers by deleting them, so this
    /// variant normally never reaches a caller.
    #[error("corrupt lock marker: {0}")]
    Corrupt(String),

    /// Underlying storage read/write/delete failed.
    #[error("{0}")]
    Io(String),
}

impl ViseError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ViseError::UserError(_) => exit_codes::USER_ERROR,
            ViseError::UnsupportedFile(_) => exit_codes::USER_ERROR,
            ViseError::Conflict { .. } => exit_codes::CONFLICT,
            ViseError::NotFound(_) => exit_codes::NOT_FOUND,
            ViseError::NotOwner { .. } => exit_codes::NOT_OWNER,
            ViseError::Corrupt(_) => exit_codes::USER_ERROR,
            ViseError::Io(_) => exit_codes::IO_FAILURE,
        }
    }
}

/// Result type alias for vise operations.
pub type Result<T> = std::result::Result<T, ViseError>;
