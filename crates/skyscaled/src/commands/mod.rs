pub mod autoscale;
pub mod history;
pub mod init;
pub mod simulate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use skyscale_core::Job;
use skyscale_core::config::SkyscaleConfig;
use skyscale_estimator::{Estimator, RawJob, RetryingSizeClient, StaticSizeTable};
use skyscale_scheduler::{Algorithm, CostAwareScheduler, PassthroughScheduler};
use skyscale_state::StateStore;
use tracing::info;

use crate::{AlgorithmKind, WorkloadArgs};

const STORE_FILE: &str = "skyscale.redb";

pub fn open_store(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(STORE_FILE);
    let store = StateStore::open(&path)?;
    info!(path = ?path, "state store opened");
    Ok(store)
}

pub fn algorithm(kind: AlgorithmKind) -> Arc<dyn Algorithm> {
    match kind {
        AlgorithmKind::CostAware => Arc::new(CostAwareScheduler),
        AlgorithmKind::Passthrough => Arc::new(PassthroughScheduler),
    }
}

/// Validated configuration plus the estimated job queue.
pub struct Workload {
    pub config: SkyscaleConfig,
    pub jobs: Vec<Job>,
}

/// Read the config, train on stored history and estimate the job file.
pub fn load_workload(store: &StateStore, args: &WorkloadArgs) -> anyhow::Result<Workload> {
    let config = SkyscaleConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;

    let mut estimator = Estimator::new(config.tags());
    let models = estimator
        .init(store)
        .context("failed to train the estimator; import job history first")?;
    info!(models, "estimator trained");

    let content = std::fs::read_to_string(&args.jobs)
        .with_context(|| format!("failed to read {}", args.jobs.display()))?;
    let raw: Vec<RawJob> = serde_json::from_str(&content)?;
    let sizes = RetryingSizeClient::new(
        StaticSizeTable::from_file(&args.sizes)?,
        config.estimator.max_attempts,
    );
    let jobs = estimator.process_queue(&raw, &sizes)?;
    info!(received = raw.len(), estimated = jobs.len(), "job queue estimated");

    Ok(Workload { config, jobs })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_is_estimated_from_stored_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).unwrap();
        let args = fixtures::workload(dir.path(), &store);

        let workload = load_workload(&store, &args).unwrap();
        assert_eq!(workload.jobs.len(), 2);
        assert_eq!(workload.jobs[0].execution_time.len(), 3);
        assert_eq!(workload.jobs[1].execution_time.len(), 1);
        assert!(dir.path().join(STORE_FILE).exists());
    }

    #[test]
    fn workload_without_history_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open_in_memory().unwrap();
        let args = fixtures::workload(dir.path(), &StateStore::open_in_memory().unwrap());

        assert!(load_workload(&store, &args).is_err());
    }
}
