use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use skyscale_cloud::{Cloud, sim_clouds};
use skyscale_core::config::SkyscaleConfig;
use skyscale_core::{CloudState, CloudTag, Job};
use skyscale_scheduler::AlgorithmInput;
use skyscale_sim::{SimulationSettings, Simulator, TickSnapshot};
use skyscale_state::{RunId, StateStore};
use tracing::info;

use super::{Workload, algorithm, load_workload, open_store};
use crate::{AlgorithmKind, WorkloadArgs};

/// Outcome of one finished simulation run.
pub struct RunReport {
    pub run_id: RunId,
    pub algorithm: String,
    pub submitted: usize,
    pub snapshots: Vec<TickSnapshot>,
    /// Spend and budget per cloud at the end of the run.
    pub spend: BTreeMap<CloudTag, (f64, f64)>,
}

impl RunReport {
    /// Jobs still queued, running or unassigned after the last tick.
    pub fn unfinished(&self) -> usize {
        self.snapshots.last().map_or(self.submitted, |s| {
            s.queues.values().map(Vec::len).sum::<usize>() + s.unassigned.len()
        })
    }

    fn print(&self) {
        println!(
            "run {} ({}): {} ticks, {}/{} jobs unfinished",
            self.run_id,
            self.algorithm,
            self.snapshots.len(),
            self.unfinished(),
            self.submitted
        );
        for (tag, (used, limit)) in &self.spend {
            println!("  {:<10} spent {:>10.2} of {:.2}", tag.to_string(), used, limit);
        }
    }
}

/// Explicit start time, else the first submission, else now.
fn start_time(config: &SkyscaleConfig, jobs: &[Job]) -> DateTime<Utc> {
    config
        .simulation
        .start_time
        .or_else(|| jobs.iter().map(|j| j.created).min())
        .unwrap_or_else(Utc::now)
}

/// Run one algorithm to completion on fresh clouds. Blocking.
pub fn execute(
    store: StateStore,
    states: BTreeMap<CloudTag, CloudState>,
    settings: SimulationSettings,
    jobs: Vec<Job>,
    kind: AlgorithmKind,
    start: DateTime<Utc>,
) -> anyhow::Result<RunReport> {
    let mut clouds = sim_clouds(states, &store);
    Simulator::check_backlog(&jobs, &clouds)?;

    let simulator = Simulator::new(algorithm(kind), store.clone(), settings);
    let name = simulator.algorithm_name().to_string();
    let run_id = store.create_run(&name, Utc::now())?;
    info!(run = run_id, algorithm = %name, %start, "run created");

    let submitted = jobs.len();
    let snapshots = simulator.simulate(
        run_id,
        jobs,
        AlgorithmInput {
            job_queue: Vec::new(),
            clouds: &mut clouds,
        },
        start,
    )?;

    let spend = clouds
        .iter()
        .map(|(tag, cloud)| (*tag, (cloud.money_used(), cloud.cost_limit())))
        .collect();
    Ok(RunReport {
        run_id,
        algorithm: name,
        submitted,
        snapshots,
        spend,
    })
}

pub async fn simulate(
    data_dir: &Path,
    args: &WorkloadArgs,
    kind: AlgorithmKind,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let Workload { config, jobs } = load_workload(&store, args)?;
    let start = start_time(&config, &jobs);
    let settings = SimulationSettings::from_config(&config.simulation);
    let states = config.cloud_states();

    let report =
        tokio::task::spawn_blocking(move || execute(store, states, settings, jobs, kind, start))
            .await??;
    report.print();

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&report.snapshots)?)?;
        info!(path = ?path, ticks = report.snapshots.len(), "snapshots written");
    }
    Ok(())
}

/// Each algorithm gets its own clouds built from the same config, so runs
/// never share fleet state. They share the store.
pub async fn compare(
    data_dir: &Path,
    args: &WorkloadArgs,
    kinds: &[AlgorithmKind],
) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let Workload { config, jobs } = load_workload(&store, args)?;
    let start = start_time(&config, &jobs);
    let settings = SimulationSettings::from_config(&config.simulation);

    let handles: Vec<_> = kinds
        .iter()
        .map(|&kind| {
            let store = store.clone();
            let states = config.cloud_states();
            let jobs = jobs.clone();
            tokio::task::spawn_blocking(move || execute(store, states, settings, jobs, kind, start))
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await??);
    }
    for report in &reports {
        report.print();
    }
    Ok(())
}
