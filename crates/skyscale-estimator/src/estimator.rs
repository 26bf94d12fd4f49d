//! Per-cloud execution-time estimator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skyscale_core::timestamp::parse_flexible;
use skyscale_core::{CloudTag, Job, JobState, PipelineParameters, TagResolution};
use skyscale_state::{JobRecord, StateStore};
use tracing::{debug, info, warn};

use crate::error::{EstimatorError, EstimatorResult};
use crate::regression::LinearModel;
use crate::sizes::DatasetSizeSource;

/// Upper bound on a single prediction: one year.
const MAX_PREDICTION_MS: f64 = 366.0 * 24.0 * 3_600_000.0;

/// A job as reported by the job service, before estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJob {
    pub id: String,
    /// Free-form routing tag. Empty leaves placement to the scheduler.
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub state: JobState,
    #[serde(default)]
    pub priority: i64,
    /// Epoch seconds, epoch milliseconds, or RFC 3339.
    pub time_submitted: String,
    #[serde(default)]
    pub time_started: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub instance_flavour: Option<String>,
}

/// Trains and holds one [`LinearModel`] per cloud.
#[derive(Debug, Clone)]
pub struct Estimator {
    known: Vec<CloudTag>,
    models: BTreeMap<CloudTag, LinearModel>,
}

fn features(data_size: i64, params: &PipelineParameters) -> [f64; 3] {
    [
        data_size as f64,
        params.feature_mask().as_feature(),
        params.input_contigs_cutoff as f64,
    ]
}

impl Estimator {
    /// An untrained estimator routing to the `known` clouds.
    pub fn new(known: Vec<CloudTag>) -> Self {
        Self {
            known,
            models: BTreeMap::new(),
        }
    }

    /// Train on the finished jobs in the store.
    pub fn init(&mut self, store: &StateStore) -> EstimatorResult<usize> {
        let records = store.load_historical_jobs()?;
        self.train(&records)
    }

    /// Replace all models with ones fitted to `records`. Returns the number
    /// of clouds that got a model.
    ///
    /// Records that never queued, have no input data, or carry a tag that
    /// resolves to no known cloud are skipped.
    pub fn train(&mut self, records: &[JobRecord]) -> EstimatorResult<usize> {
        let mut samples: BTreeMap<CloudTag, (Vec<Vec<f64>>, Vec<f64>)> = BTreeMap::new();
        let mut skipped = 0usize;
        for record in records {
            if record.queue_duration_ms <= 0 || record.input_data_size <= 0 {
                skipped += 1;
                continue;
            }
            let TagResolution::Cloud(tag) = CloudTag::resolve(&record.tag, &self.known) else {
                skipped += 1;
                continue;
            };
            let (rows, targets) = samples.entry(tag).or_default();
            rows.push(features(record.input_data_size, &record.parameters).to_vec());
            targets.push(record.runtime_ms as f64);
        }
        if samples.is_empty() {
            return Err(EstimatorError::NoTrainingData);
        }

        let mut models = BTreeMap::new();
        for (tag, (rows, targets)) in samples {
            let model = LinearModel::fit(&rows, &targets)?;
            info!(cloud = %tag, samples = model.samples(), "execution time model trained");
            models.insert(tag, model);
        }
        debug!(skipped, "training records skipped");
        self.models = models;
        Ok(self.models.len())
    }

    pub fn has_model(&self, tag: CloudTag) -> bool {
        self.models.contains_key(&tag)
    }

    /// Predicted execution time in milliseconds, never negative. A
    /// non-finite prediction or one above a year is an error.
    pub fn predict_ms(
        &self,
        tag: CloudTag,
        data_size: i64,
        params: &PipelineParameters,
    ) -> EstimatorResult<i64> {
        let model = self.models.get(&tag).ok_or(EstimatorError::NoModel(tag))?;
        let predicted = model.predict(&features(data_size, params))?;
        if !predicted.is_finite() || predicted > MAX_PREDICTION_MS {
            return Err(EstimatorError::PredictionOutOfRange {
                tag,
                value: predicted,
            });
        }
        Ok(predicted.round().max(0.0) as i64)
    }

    /// Estimate a batch of raw jobs.
    ///
    /// CANCELLED and DELAYED jobs and jobs whose tag matches no known cloud
    /// are dropped. Unassigned jobs get a prediction for every cloud with a
    /// model, routed jobs only for their cloud. Any lookup or prediction
    /// failure fails the whole batch.
    pub fn process_queue(
        &self,
        jobs: &[RawJob],
        sizes: &dyn DatasetSizeSource,
    ) -> EstimatorResult<Vec<Job>> {
        let mut out = Vec::with_capacity(jobs.len());
        for raw in jobs {
            if raw.state.is_skipped() {
                continue;
            }
            let tag = match CloudTag::resolve(&raw.tag, &self.known) {
                TagResolution::Undefined => {
                    debug!(job = %raw.id, tag = %raw.tag, "job with unknown tag dropped");
                    continue;
                }
                TagResolution::Unassigned => None,
                TagResolution::Cloud(tag) => Some(tag),
            };

            let created = parse_flexible(&raw.time_submitted)?;
            let started = raw.time_started.as_deref().map(parse_flexible).transpose()?;
            let deadline = raw.deadline.as_deref().map(parse_flexible).transpose()?;
            let params = PipelineParameters::from_job_parameters(&raw.parameters)?;
            let data_size = sizes
                .fetch_dataset_size(&raw.id)
                .map_err(|source| EstimatorError::SizeFetch {
                    job_id: raw.id.clone(),
                    source,
                })?;

            let mut execution_time = BTreeMap::new();
            match tag {
                Some(tag) => {
                    execution_time.insert(tag, self.predict_ms(tag, data_size, &params)?);
                }
                None => {
                    for &candidate in self.models.keys() {
                        execution_time.insert(candidate, self.predict_ms(candidate, data_size, &params)?);
                    }
                    if execution_time.is_empty() {
                        warn!(job = %raw.id, "unassigned job has no estimate for any cloud");
                    }
                }
            }

            out.push(Job {
                id: raw.id.clone(),
                tag,
                parameters: raw.parameters.clone(),
                state: raw.state,
                priority: raw.priority,
                execution_time,
                deadline,
                created,
                started,
                instance_flavour: raw.instance_flavour.clone().filter(|f| !f.is_empty()),
            });
        }
        info!(received = jobs.len(), estimated = out.len(), "job queue estimated");
        Ok(out)
    }
}
