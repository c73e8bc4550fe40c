//! Error types for the container adapter.

use thiserror::Error;

/// Result type alias for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors from driving the pot CLI.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("pot {action}: {output}")]
    Command { action: String, output: String },
}
