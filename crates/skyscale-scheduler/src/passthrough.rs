//! Baseline algorithm that changes nothing.

use chrono::{DateTime, Utc};

use crate::algorithm::{Algorithm, AlgorithmInput, AlgorithmOutput};
use crate::error::SchedulerResult;

/// Returns the queue untouched and never scales. Simulating it gives the
/// "before" numbers for a comparison run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughScheduler;

impl Algorithm for PassthroughScheduler {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn run(&self, input: AlgorithmInput<'_>, _now: DateTime<Utc>) -> SchedulerResult<AlgorithmOutput> {
        Ok(AlgorithmOutput {
            instances: Vec::new(),
            job_queue: input.job_queue,
        })
    }
}
