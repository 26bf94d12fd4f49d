//! Estimator error types.

use skyscale_core::CloudTag;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("no usable training data")]
    NoTrainingData,

    #[error("no model trained for cloud {0}")]
    NoModel(CloudTag),

    #[error("regression system is singular")]
    Singular,

    #[error("prediction {value} ms for cloud {tag} is out of range")]
    PredictionOutOfRange { tag: CloudTag, value: f64 },

    #[error("feature vector has {got} values, model expects {expected}")]
    Dimension { expected: usize, got: usize },

    #[error("dataset size lookup for job {job_id} failed: {source}")]
    SizeFetch {
        job_id: String,
        #[source]
        source: SizeFetchError,
    },

    #[error("invalid job input: {0}")]
    Input(#[from] skyscale_core::ConfigError),

    #[error("state store error: {0}")]
    State(#[from] skyscale_state::StateError),
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;

/// Failure of a single dataset-size lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizeFetchError {
    /// Worth retrying: timeouts, connection resets.
    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),
}
