//! Cloud error types.

use thiserror::Error;

/// Errors raised by a cloud backend. Any of these aborts the current tick.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("cloud {cloud} has no instance type {instance_type}")]
    UnknownInstanceType { cloud: String, instance_type: String },

    #[error("cloud {cloud} is at its instance limit of {limit}")]
    LimitReached { cloud: String, limit: usize },

    #[error("cloud {0} is not attached to a run")]
    NoRun(String),

    #[error("state store error: {0}")]
    State(#[from] skyscale_state::StateError),
}

pub type CloudResult<T> = Result<T, CloudError>;
