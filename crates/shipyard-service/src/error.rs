//! Error types for the service supervisor.

use thiserror::Error;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from rc.d script management or the OS service manager.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("service {action}: {output}")]
    Command { action: String, output: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
