//! Error types for self-update.

use thiserror::Error;

/// Result type alias for update operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors from the two-phase binary replacement.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("write candidate: {0}")]
    Write(std::io::Error),

    #[error("validate candidate: {0}")]
    Validation(String),

    #[error("swap binaries: {0}")]
    Swap(std::io::Error),

    #[error("swap failed ({swap}) and restore failed ({restore})")]
    SwapAndRestoreFailed { swap: String, restore: String },

    #[error("no backup binary found at {0}")]
    NoBackup(String),
}
