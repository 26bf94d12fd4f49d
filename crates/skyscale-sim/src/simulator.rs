//! The time-stepped simulation engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use skyscale_cloud::{Cloud, CloudCollection};
use skyscale_core::config::SimulationConfig;
use skyscale_core::{CloudTag, Instance, Job, JobState};
use skyscale_scheduler::{Algorithm, AlgorithmInput, sort_queue};
use skyscale_state::{RunId, SchedulerEvent, StateStore};
use tracing::{debug, info, warn};

use crate::error::{SimError, SimResult};

/// Tick count and spacing of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationSettings {
    pub iterations: u32,
    pub timestep: Duration,
}

impl SimulationSettings {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            iterations: config.iterations,
            timestep: Duration::minutes(i64::from(config.timestep_minutes)),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

/// State of every cloud at the end of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSnapshot {
    pub tick: u32,
    pub timestamp: DateTime<Utc>,
    /// Jobs still queued or running, per cloud.
    pub queues: BTreeMap<CloudTag, Vec<Job>>,
    pub fleets: BTreeMap<CloudTag, Vec<Instance>>,
    /// Live jobs no cloud took this tick.
    pub unassigned: Vec<Job>,
}

/// Drives one algorithm over simulated time.
pub struct Simulator {
    algorithm: Arc<dyn Algorithm>,
    store: StateStore,
    settings: SimulationSettings,
}

impl Simulator {
    pub fn new(algorithm: Arc<dyn Algorithm>, store: StateStore, settings: SimulationSettings) -> Self {
        Self {
            algorithm,
            store,
            settings,
        }
    }

    pub fn algorithm_name(&self) -> &str {
        self.algorithm.name()
    }

    pub fn settings(&self) -> SimulationSettings {
        self.settings
    }

    /// Reject jobs routed to a cloud the run does not have.
    pub fn check_backlog(jobs: &[Job], clouds: &CloudCollection) -> SimResult<()> {
        match jobs
            .iter()
            .find_map(|j| j.tag.filter(|t| !clouds.contains_key(t)).map(|t| (j, t)))
        {
            Some((job, tag)) => Err(SimError::UnknownCloud {
                job: job.id.clone(),
                tag,
            }),
            None => Ok(()),
        }
    }

    /// Run every tick of `run_id`, starting at `start`.
    ///
    /// `backlog` holds jobs that have not arrived yet; each is released into
    /// the live queue on the first tick whose clock is past its `created`
    /// time. `input.job_queue` is live from the start. The run is ended in
    /// the store only when all ticks succeed.
    pub fn simulate(
        &self,
        run_id: RunId,
        backlog: Vec<Job>,
        input: AlgorithmInput<'_>,
        start: DateTime<Utc>,
    ) -> SimResult<Vec<TickSnapshot>> {
        let AlgorithmInput { job_queue, clouds } = input;
        Self::check_backlog(&backlog, clouds)?;
        Self::check_backlog(&job_queue, clouds)?;
        for cloud in clouds.values_mut() {
            cloud.attach_run(run_id);
        }
        info!(
            run = run_id,
            algorithm = %self.algorithm.name(),
            iterations = self.settings.iterations,
            backlog = backlog.len(),
            "simulation started"
        );

        let mut backlog = backlog;
        let mut live = job_queue;
        let mut now = start;
        let mut snapshots = Vec::with_capacity(self.settings.iterations as usize);

        for tick in 0..self.settings.iterations {
            if tick > 0 {
                now = now
                    .checked_add_signed(self.settings.timestep)
                    .ok_or(SimError::ClockOverflow { tick })?;
            }

            let (arrived, waiting): (Vec<Job>, Vec<Job>) =
                backlog.into_iter().partition(|j| j.created < now);
            backlog = waiting;
            if !arrived.is_empty() {
                debug!(tick, arrived = arrived.len(), "jobs released");
            }
            live.extend(arrived);

            let cost_before = queue_costs(&live, clouds, now)?;

            let out = self
                .algorithm
                .run(
                    AlgorithmInput {
                        job_queue: live,
                        clouds: &mut *clouds,
                    },
                    now,
                )
                .map_err(|source| SimError::Tick { tick, source })?;

            let mut groups: BTreeMap<CloudTag, Vec<Job>> = BTreeMap::new();
            let mut unplaced = Vec::new();
            for job in out.job_queue {
                match job.tag {
                    Some(tag) => groups.entry(tag).or_default().push(job),
                    None => unplaced.push(job),
                }
            }
            for (tag, jobs) in &groups {
                if !clouds.contains_key(tag) {
                    let job = jobs.first().map(|j| j.id.clone()).unwrap_or_default();
                    return Err(SimError::UnknownCloud { job, tag: *tag });
                }
            }

            let mut snapshot = TickSnapshot {
                tick,
                timestamp: now,
                queues: BTreeMap::new(),
                fleets: BTreeMap::new(),
                unassigned: unplaced.clone(),
            };
            let mut next = Vec::new();
            for (tag, cloud) in clouds.iter_mut() {
                let group = groups.remove(tag).unwrap_or_default();
                let survivors = advance_group(&mut **cloud, group, now)?;

                let queue_duration_ms = cloud.total_duration(&survivors, now)?;
                let cost_after = cloud.total_cost(&survivors, now)?;
                cloud.accrue_usage(self.settings.timestep)?;
                self.store.record_scheduler_event(&SchedulerEvent {
                    run_id,
                    queue_duration_ms,
                    timestamp: now,
                    tag: *tag,
                    cost_before: cost_before.get(tag).copied().unwrap_or(0.0),
                    cost_after,
                    money_used: cloud.money_used(),
                })?;
                info!(
                    tick,
                    cloud = %tag,
                    queue_duration_ms,
                    jobs = survivors.len(),
                    "total expected queue duration"
                );

                snapshot.fleets.insert(*tag, cloud.instances()?);
                next.extend(survivors.iter().cloned());
                snapshot.queues.insert(*tag, survivors);
            }
            next.extend(unplaced);
            live = next;
            snapshots.push(snapshot);
        }

        self.store.end_run(run_id, Utc::now())?;
        info!(run = run_id, ticks = snapshots.len(), "simulation finished");
        Ok(snapshots)
    }
}

/// Total expected cost of each cloud's share of `live`.
fn queue_costs(
    live: &[Job],
    clouds: &CloudCollection,
    now: DateTime<Utc>,
) -> SimResult<BTreeMap<CloudTag, f64>> {
    let mut costs = BTreeMap::new();
    for (tag, cloud) in clouds {
        let queue: Vec<Job> = live
            .iter()
            .filter(|j| j.tag == Some(*tag))
            .cloned()
            .collect();
        costs.insert(*tag, cloud.total_cost(&queue, now)?);
    }
    Ok(costs)
}

/// Start jobs on free instances, then retire finished jobs. Returns the
/// jobs that carry over to the next tick.
fn advance_group(cloud: &mut dyn Cloud, mut group: Vec<Job>, now: DateTime<Utc>) -> SimResult<Vec<Job>> {
    sort_queue(&mut group);

    let fleet = cloud.instances()?;
    let mut active = fleet.iter().filter(|i| i.is_active()).count();
    let mut running = group.iter().filter(|j| j.is_running()).count();

    for job in group.iter_mut().filter(|j| !j.is_running()) {
        if active <= running {
            let Some(idle) = cloud.instances()?.into_iter().find(|i| i.is_inactive()) else {
                break;
            };
            let mut instance = Instance::request(idle.instance_type);
            cloud.add_instance(&mut instance, now)?;
            active += 1;
        }
        job.state = JobState::Running;
        job.started = Some(now);
        running += 1;
        debug!(job = %job.id, cloud = %cloud.name(), "job started");
    }

    let mut survivors = Vec::with_capacity(group.len());
    for mut job in group {
        let done = job.is_running() && job.finishes_at().is_some_and(|end| end < now);
        if !done {
            survivors.push(job);
            continue;
        }
        job.state = JobState::Finished;
        match cloud.release_instance(job.instance_flavour.as_deref())? {
            Some(instance) => debug!(job = %job.id, %instance, "job finished"),
            None => warn!(job = %job.id, cloud = %cloud.name(), "finished job had no active instance"),
        }
    }
    Ok(survivors)
}
