//! skyscale-estimator: execution-time predictions for incoming jobs.
//!
//! One linear model per cloud is trained on finished jobs, with the features
//! `[dataset size, parameter bitmask, contig cutoff]` and the observed
//! runtime as target. [`Estimator::process_queue`] turns raw job records into
//! scheduler [`Job`](skyscale_core::Job)s carrying per-cloud predictions.
//!
//! Dataset sizes come from a [`DatasetSizeSource`]; wrap a flaky source in
//! [`RetryingSizeClient`] to retry transient failures.

pub mod error;
pub mod estimator;
pub mod regression;
pub mod sizes;

pub use error::{EstimatorError, EstimatorResult, SizeFetchError};
pub use estimator::{Estimator, RawJob};
pub use regression::LinearModel;
pub use sizes::{DatasetSizeSource, RetryingSizeClient, StaticSizeTable};
