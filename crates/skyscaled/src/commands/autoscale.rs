use std::path::Path;

use chrono::Utc;
use serde_json::json;
use skyscale_cloud::{Cloud, sim_clouds};
use skyscale_scheduler::{Algorithm, AlgorithmInput, AlgorithmOutput, CostAwareScheduler};
use skyscale_sim::Simulator;
use skyscale_state::{RunId, StateStore};
use tracing::info;

use super::{Workload, load_workload, open_store};
use crate::WorkloadArgs;

/// One scheduling pass over the estimated queue, recorded as its own run.
pub fn scale_once(store: &StateStore, workload: Workload) -> anyhow::Result<(RunId, AlgorithmOutput)> {
    let Workload { config, jobs } = workload;
    let mut clouds = sim_clouds(config.cloud_states(), store);
    Simulator::check_backlog(&jobs, &clouds)?;

    let now = Utc::now();
    let scheduler = CostAwareScheduler;
    let run_id = store.create_run(scheduler.name(), now)?;
    for cloud in clouds.values_mut() {
        cloud.attach_run(run_id);
    }

    let out = scheduler.run(
        AlgorithmInput {
            job_queue: jobs,
            clouds: &mut clouds,
        },
        now,
    )?;
    store.end_run(run_id, Utc::now())?;
    info!(
        run = run_id,
        instances = out.instances.len(),
        jobs = out.job_queue.len(),
        "scaling pass finished"
    );
    Ok((run_id, out))
}

pub fn autoscale(data_dir: &Path, args: &WorkloadArgs) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let workload = load_workload(&store, args)?;
    let (run_id, out) = scale_once(&store, workload)?;

    let report = json!({
        "run": run_id,
        "instances": out.instances,
        "jobQueue": out.job_queue,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
