//! Dataset-size lookup.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::SizeFetchError;

/// Source of input dataset sizes, in bytes, by job id.
pub trait DatasetSizeSource: Send + Sync {
    fn fetch_dataset_size(&self, job_id: &str) -> Result<i64, SizeFetchError>;
}

/// Retries transient failures of the wrapped source.
///
/// `max_attempts` counts retries after the first call, so a source that
/// keeps failing is called `max_attempts + 1` times. Permanent failures are
/// returned at once.
pub struct RetryingSizeClient<S> {
    inner: S,
    max_attempts: u32,
}

impl<S: DatasetSizeSource> RetryingSizeClient<S> {
    pub fn new(inner: S, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts,
        }
    }
}

impl<S: DatasetSizeSource> DatasetSizeSource for RetryingSizeClient<S> {
    fn fetch_dataset_size(&self, job_id: &str) -> Result<i64, SizeFetchError> {
        let mut retries = 0;
        loop {
            match self.inner.fetch_dataset_size(job_id) {
                Err(SizeFetchError::Transient(reason)) if retries < self.max_attempts => {
                    retries += 1;
                    warn!(job = %job_id, retry = retries, %reason, "size lookup failed, retrying");
                }
                result => return result,
            }
        }
    }
}

/// Sizes loaded up front from a JSON object of `{ "job id": bytes }`.
///
/// Jobs missing from the table have no input file and report size 0.
#[derive(Debug, Clone, Default)]
pub struct StaticSizeTable {
    sizes: HashMap<String, i64>,
}

impl StaticSizeTable {
    pub fn new(sizes: HashMap<String, i64>) -> Self {
        Self { sizes }
    }

    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&content)?;
        debug!(?path, jobs = table.len(), "size table loaded");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl DatasetSizeSource for StaticSizeTable {
    fn fetch_dataset_size(&self, job_id: &str) -> Result<i64, SizeFetchError> {
        match self.sizes.get(job_id) {
            Some(&size) if size < 0 => Err(SizeFetchError::Permanent(format!(
                "negative size {size} for job {job_id}"
            ))),
            Some(&size) => Ok(size),
            None => Ok(0),
        }
    }
}
