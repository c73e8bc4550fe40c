//! Error types for the artifact store.

use thiserror::Error;

/// Result type alias for artifact store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while unpacking or promoting artifacts.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid zip: {0}")]
    InvalidZip(String),

    #[error("zip slip detected: {0}")]
    ZipSlip(String),

    #[error("binary {0} not found in zip")]
    BinaryNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
