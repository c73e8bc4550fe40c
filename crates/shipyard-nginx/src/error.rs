//! Error types for nginx config management.

use thiserror::Error;

/// Result type alias for nginx operations.
pub type NginxResult<T> = Result<T, NginxError>;

/// Errors from rendering or activating proxy configuration.
#[derive(Debug, Error)]
pub enum NginxError {
    #[error("unterminated template placeholder")]
    UnterminatedPlaceholder,

    #[error("malformed template placeholder: {0}")]
    MalformedPlaceholder(String),

    #[error("unknown template variable: {0}")]
    UnknownVariable(String),

    #[error("template variable {0} requires a backend")]
    BackendRequired(String),

    #[error("spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("nginx reload: {0}")]
    Reload(String),

    #[error("nginx validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
