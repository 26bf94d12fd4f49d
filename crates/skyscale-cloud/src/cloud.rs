//! The `Cloud` capability trait.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use skyscale_core::{CloudState, CloudTag, Instance, InstanceState, InstanceType, Job, millis_to_hours};
use skyscale_state::RunId;

use crate::error::{CloudError, CloudResult};

/// Clouds of one run, keyed by tag. Iteration order is `CloudTag` order,
/// which is the tie-break order everywhere a "first" cloud is chosen.
pub type CloudCollection = BTreeMap<CloudTag, Box<dyn Cloud>>;

/// One cloud or cluster as seen by the scheduler.
///
/// A cloud is owned by exactly one run at a time. Implementations hold
/// their fleet in memory and report every mutation to the run's event sink.
pub trait Cloud: Send {
    fn name(&self) -> &str;

    /// Routing key of the jobs this cloud accepts.
    fn tag(&self) -> CloudTag;

    /// Bind subsequent fleet events to `run_id`.
    fn attach_run(&mut self, run_id: RunId);

    /// Current fleet snapshot.
    fn instances(&self) -> CloudResult<Vec<Instance>>;

    fn instance_types(&self) -> CloudResult<BTreeMap<String, InstanceType>>;

    /// Hard cap on ACTIVE plus INACTIVE instances.
    fn instance_limit(&self) -> usize;

    fn default_instance_type(&self) -> &str;

    /// Activate an instance of `instance.instance_type`.
    ///
    /// Reuses an INACTIVE instance of the same type when one exists, keeping
    /// its id. Otherwise a new instance with a fresh id joins the fleet.
    /// `instance` is updated with the id and ACTIVE state, and the id is
    /// returned.
    fn add_instance(&mut self, instance: &mut Instance, now: DateTime<Utc>) -> CloudResult<String>;

    /// Remove an instance from the fleet. Unknown ids are ignored: the job
    /// holding one may finish after a previous tick reclaimed it.
    fn delete_instance(&mut self, id: &str, now: DateTime<Utc>) -> CloudResult<()>;

    /// Flip one ACTIVE instance to INACTIVE after its job finished.
    ///
    /// Prefers an instance of `flavour`, any ACTIVE instance otherwise.
    /// Returns the id of the released instance, if any was ACTIVE.
    fn release_instance(&mut self, flavour: Option<&str>) -> CloudResult<Option<String>>;

    /// Charge every ACTIVE instance for `elapsed`. Returns the amount charged.
    fn accrue_usage(&mut self, elapsed: chrono::Duration) -> CloudResult<f64>;

    fn cost_limit(&self) -> f64;

    fn money_used(&self) -> f64;

    fn available_funds(&self) -> f64 {
        self.cost_limit() - self.money_used()
    }

    /// Copy of the in-memory cloud model.
    fn snapshot(&self) -> CloudState;

    /// Price of the job's remaining execution time on `instance_type`.
    fn expected_job_cost(&self, job: &Job, instance_type: &str, now: DateTime<Utc>) -> CloudResult<f64> {
        let types = self.instance_types()?;
        let ty = types
            .get(instance_type)
            .ok_or_else(|| CloudError::UnknownInstanceType {
                cloud: self.name().to_string(),
                instance_type: instance_type.to_string(),
            })?;
        Ok(millis_to_hours(job.remaining_ms(self.tag(), now)) * ty.price_increment)
    }

    /// Sum of [`expected_job_cost`](Cloud::expected_job_cost) over `queue`,
    /// each job priced on its flavour or the default type.
    fn total_cost(&self, queue: &[Job], now: DateTime<Utc>) -> CloudResult<f64> {
        queue.iter().try_fold(0.0, |acc, job| -> CloudResult<f64> {
            let ty = job
                .instance_flavour
                .as_deref()
                .unwrap_or_else(|| self.default_instance_type());
            Ok(acc + self.expected_job_cost(job, ty, now)?)
        })
    }

    /// Pessimistic makespan of `queue` in milliseconds.
    ///
    /// Jobs are dealt round-robin, in queue order, onto one lane per ACTIVE
    /// instance (at least one lane). The longest lane is the result, capped
    /// at `i64::MAX`.
    fn total_duration(&self, queue: &[Job], now: DateTime<Utc>) -> CloudResult<i64> {
        let active = self
            .instances()?
            .iter()
            .filter(|i| i.state == InstanceState::Active)
            .count();
        let mut lanes = vec![0i64; active.max(1)];
        let width = lanes.len();
        for (i, job) in queue.iter().enumerate() {
            let lane = &mut lanes[i % width];
            *lane = lane.saturating_add(job.remaining_ms(self.tag(), now));
        }
        Ok(lanes.into_iter().max().unwrap_or(0))
    }
}
