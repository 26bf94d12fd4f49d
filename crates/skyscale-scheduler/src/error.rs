//! Scheduler error types.

use skyscale_core::CloudTag;
use thiserror::Error;

/// Errors that abort a scheduling tick. Fleet changes made before the
/// failure are kept.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job {job} is routed to unconfigured cloud {tag}")]
    UnknownCloud { job: String, tag: CloudTag },

    #[error("cloud error: {0}")]
    Cloud(#[from] skyscale_cloud::CloudError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
