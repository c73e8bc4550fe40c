//! Error types for certificate provisioning.

use thiserror::Error;

/// Result type alias for TLS operations.
pub type TlsResult<T> = Result<T, TlsError>;

/// Errors from the external ACME client.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("certificate request for {domain} failed: {output}")]
    Acme { domain: String, output: String },

    #[error("client succeeded but certificate for {0} not found at expected path")]
    MissingAfterIssue(String),

    #[error("renew failed: {0}")]
    Renew(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
