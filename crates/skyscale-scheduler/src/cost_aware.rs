//! Cost- and makespan-aware placement with per-cloud admission control.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use skyscale_cloud::{Cloud, CloudCollection};
use skyscale_core::{CloudTag, Instance, Job};
use tracing::{debug, info};

use crate::algorithm::{Algorithm, AlgorithmInput, AlgorithmOutput, sort_queue};
use crate::error::{SchedulerError, SchedulerResult};

/// Places unassigned jobs on the cloud that finishes its queue first and
/// keeps each cloud's ACTIVE fleet in step with its queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostAwareScheduler;

/// What placing a job on one cloud would look like.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    tag: CloudTag,
    cost: f64,
    duration_ms: i64,
}

fn cheaper(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    a.cost
        .total_cmp(&b.cost)
        .then(a.duration_ms.cmp(&b.duration_ms))
        .then(a.tag.cmp(&b.tag))
}

fn faster(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    a.duration_ms
        .cmp(&b.duration_ms)
        .then(a.cost.total_cmp(&b.cost))
        .then(a.tag.cmp(&b.tag))
}

impl CostAwareScheduler {
    /// Candidate for `job` on `cloud`, given the queue already routed there.
    ///
    /// A cloud with no estimate for the job is not a candidate. An empty
    /// queue is priced as the job alone and is available immediately.
    fn evaluate(
        job: &Job,
        cloud: &dyn Cloud,
        queue: &[Job],
        now: DateTime<Utc>,
    ) -> SchedulerResult<Option<Candidate>> {
        let tag = cloud.tag();
        if !job.execution_time.contains_key(&tag) {
            return Ok(None);
        }
        let (cost, duration_ms) = if queue.is_empty() {
            let ty = job
                .instance_flavour
                .as_deref()
                .unwrap_or_else(|| cloud.default_instance_type());
            (cloud.expected_job_cost(job, ty, now)?, 0)
        } else {
            (cloud.total_cost(queue, now)?, cloud.total_duration(queue, now)?)
        };
        Ok(Some(Candidate {
            tag,
            cost,
            duration_ms,
        }))
    }

    /// Assign each unassigned job a cloud. Placed jobs join their cloud's
    /// queue before the next job is evaluated. Returns the jobs no cloud
    /// could take.
    fn place(
        unassigned: Vec<Job>,
        clouds: &CloudCollection,
        queues: &mut BTreeMap<CloudTag, Vec<Job>>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Vec<Job>> {
        let mut unplaced = Vec::new();
        for mut job in unassigned {
            let mut candidates = Vec::with_capacity(clouds.len());
            for (tag, cloud) in clouds {
                let queue = queues.get(tag).map(Vec::as_slice).unwrap_or_default();
                if let Some(candidate) = Self::evaluate(&job, &**cloud, queue, now)? {
                    candidates.push(candidate);
                }
            }

            let cheapest = candidates.iter().min_by(|a, b| cheaper(a, b));
            let fastest = candidates.iter().min_by(|a, b| faster(a, b));
            let (Some(cheapest), Some(fastest)) = (cheapest, fastest) else {
                debug!(job = %job.id, "no cloud can estimate job, left unassigned");
                unplaced.push(job);
                continue;
            };

            // Latency wins when the cheapest and the fastest cloud disagree.
            let chosen = fastest.tag;
            debug!(
                job = %job.id,
                cloud = %chosen,
                cheapest = %cheapest.tag,
                cost = fastest.cost,
                duration_ms = fastest.duration_ms,
                "job placed"
            );
            job.tag = Some(chosen);
            queues.entry(chosen).or_default().push(job);
        }
        Ok(unplaced)
    }

    /// Activate instances until the ACTIVE fleet covers the queue, then drop
    /// INACTIVE instances the queue cannot use.
    fn scale(
        cloud: &mut dyn Cloud,
        queue: &[Job],
        now: DateTime<Utc>,
        created: &mut Vec<Instance>,
    ) -> SchedulerResult<()> {
        let pending = queue.iter().filter(|j| !j.is_running()).count();
        for _ in 0..pending {
            let fleet = cloud.instances()?;
            let active = fleet.iter().filter(|i| i.is_active()).count();
            if active >= queue.len() {
                break;
            }
            if fleet.len() < cloud.instance_limit() {
                let mut instance = Instance::request(cloud.default_instance_type());
                cloud.add_instance(&mut instance, now)?;
                created.push(instance);
            } else if let Some(idle) = fleet.iter().find(|i| i.is_inactive()) {
                let mut instance = Instance::request(idle.instance_type.clone());
                cloud.add_instance(&mut instance, now)?;
            } else {
                debug!(cloud = %cloud.name(), limit = cloud.instance_limit(), "fleet at limit");
                break;
            }
        }

        let fleet = cloud.instances()?;
        if fleet.len() > queue.len() {
            for idle in fleet.iter().filter(|i| i.is_inactive()) {
                cloud.delete_instance(&idle.id, now)?;
            }
        }
        Ok(())
    }

    /// Delete every INACTIVE instance of a cloud with nothing queued.
    fn reclaim(cloud: &mut dyn Cloud, now: DateTime<Utc>) -> SchedulerResult<usize> {
        let idle: Vec<String> = cloud
            .instances()?
            .into_iter()
            .filter(|i| i.is_inactive())
            .map(|i| i.id)
            .collect();
        for id in &idle {
            cloud.delete_instance(id, now)?;
        }
        Ok(idle.len())
    }
}

impl Algorithm for CostAwareScheduler {
    fn name(&self) -> &str {
        "cost-aware"
    }

    fn run(&self, input: AlgorithmInput<'_>, now: DateTime<Utc>) -> SchedulerResult<AlgorithmOutput> {
        let AlgorithmInput { job_queue, clouds } = input;

        let mut queues: BTreeMap<CloudTag, Vec<Job>> = BTreeMap::new();
        let mut unassigned = Vec::new();
        for job in job_queue {
            match job.tag {
                Some(tag) if clouds.contains_key(&tag) => queues.entry(tag).or_default().push(job),
                Some(tag) => {
                    return Err(SchedulerError::UnknownCloud { job: job.id, tag });
                }
                None => unassigned.push(job),
            }
        }

        let unplaced = Self::place(unassigned, clouds, &mut queues, now)?;

        let mut created = Vec::new();
        for (tag, cloud) in clouds.iter_mut() {
            match queues.get_mut(tag) {
                Some(queue) if !queue.is_empty() => {
                    sort_queue(queue);
                    Self::scale(&mut **cloud, queue, now, &mut created)?;
                }
                _ => {
                    let reclaimed = Self::reclaim(&mut **cloud, now)?;
                    if reclaimed > 0 {
                        info!(cloud = %tag, reclaimed, "idle instances reclaimed");
                    }
                }
            }
        }

        let mut out_queue: Vec<Job> = queues.into_values().flatten().collect();
        out_queue.extend(unplaced);
        Ok(AlgorithmOutput {
            instances: created,
            job_queue: out_queue,
        })
    }
}
