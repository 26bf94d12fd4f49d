//! The scheduling entry point shared by every algorithm.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use skyscale_cloud::CloudCollection;
use skyscale_core::{Instance, Job};

use crate::error::SchedulerResult;

/// Everything an algorithm sees for one tick.
pub struct AlgorithmInput<'a> {
    pub job_queue: Vec<Job>,
    pub clouds: &'a mut CloudCollection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlgorithmOutput {
    /// Instances activated by this tick.
    pub instances: Vec<Instance>,
    pub job_queue: Vec<Job>,
}

/// A scheduling policy. Implementations must be stateless between calls:
/// all state lives in the queue and the clouds.
pub trait Algorithm: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, input: AlgorithmInput<'_>, now: DateTime<Utc>) -> SchedulerResult<AlgorithmOutput>;
}

/// Queue order within one cloud: RUNNING jobs first, then higher priority,
/// then earlier deadline. Jobs without a deadline go after those with one.
/// The sort is stable.
pub fn sort_queue(queue: &mut [Job]) {
    queue.sort_by(|a, b| {
        b.is_running()
            .cmp(&a.is_running())
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| match (a.deadline, b.deadline) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
}
