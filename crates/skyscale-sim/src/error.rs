//! Simulation error types.

use skyscale_core::CloudTag;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("job {job} is routed to unconfigured cloud {tag}")]
    UnknownCloud { job: String, tag: CloudTag },

    #[error("scheduling failed at tick {tick}: {source}")]
    Tick {
        tick: u32,
        #[source]
        source: skyscale_scheduler::SchedulerError,
    },

    #[error("simulated clock overflows at tick {tick}")]
    ClockOverflow { tick: u32 },

    #[error("cloud error: {0}")]
    Cloud(#[from] skyscale_cloud::CloudError),

    #[error("state store error: {0}")]
    State(#[from] skyscale_state::StateError),
}

pub type SimResult<T> = Result<T, SimError>;
