//! Error types for configuration and input decoding.

use thiserror::Error;

/// Result type alias for config and input validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Input errors. These are raised before a run is created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown cloud tag: {0}")]
    UnknownTag(String),

    #[error("duplicate cloud tag: {0}")]
    DuplicateCloud(String),

    #[error("invalid cloud {cloud}: {reason}")]
    InvalidCloud { cloud: String, reason: String },

    #[error("invalid simulation settings: {0}")]
    InvalidSimulation(String),

    #[error("invalid parameter {key}={value}")]
    InvalidParameter { key: String, value: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
