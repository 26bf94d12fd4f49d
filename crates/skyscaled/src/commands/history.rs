use std::path::Path;

use anyhow::Context;
use skyscale_state::{JobRecord, RunId, StateStore};
use tracing::info;

use super::open_store;

pub fn import_records(store: &StateStore, file: &Path) -> anyhow::Result<usize> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let records: Vec<JobRecord> = serde_json::from_str(&content)?;
    let stored = store.put_historical_jobs(&records)?;
    info!(stored, "historical jobs imported");
    Ok(stored)
}

pub fn import(data_dir: &Path, file: &Path) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let stored = import_records(&store, file)?;
    println!("imported {stored} job records");
    Ok(())
}

pub fn runs(data_dir: &Path) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let runs = store.list_runs()?;
    if runs.is_empty() {
        println!("no runs recorded");
        return Ok(());
    }
    println!("{:>6}  {:<14} {:<27} FINISHED", "ID", "NAME", "STARTED");
    for run in runs {
        let finished = run
            .finished
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        println!(
            "{:>6}  {:<14} {:<27} {}",
            run.id,
            run.name,
            run.started.to_rfc3339(),
            finished
        );
    }
    Ok(())
}

/// Print a run's events as JSON lines.
pub fn events(data_dir: &Path, run_id: RunId, fleet: bool, scheduler: bool) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    store
        .get_run(run_id)?
        .with_context(|| format!("run {run_id} not found"))?;

    if fleet {
        for event in store.list_fleet_events(run_id)? {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    if scheduler {
        for event in store.list_scheduler_events(run_id)? {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}
