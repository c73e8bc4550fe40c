//! Error types for configuration handling.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading, validating, or persisting config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("site {0} already exists")]
    SiteExists(String),

    #[error("site not found: {0}")]
    SiteNotFound(String),

    #[error("site {0} has no backend config")]
    NoBackend(String),
}
