//! Job, instance, and cloud state types shared across Skyscale crates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::CloudTag;

/// Name of the instance type used when a job has no flavour preference.
pub const DEFAULT_INSTANCE_TYPE: &str = "default";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

// ── Job ───────────────────────────────────────────────────────────

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Cancelled,
    Delayed,
}

impl JobState {
    /// Jobs in these states are never estimated or scheduled.
    pub fn is_skipped(self) -> bool {
        matches!(self, JobState::Cancelled | JobState::Delayed)
    }
}

/// A batch job as seen by the scheduler and simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Assigned cloud. `None` means the scheduler must pick one.
    pub tag: Option<CloudTag>,
    pub parameters: BTreeMap<String, String>,
    pub state: JobState,
    /// Higher runs first within a cloud's queue.
    pub priority: i64,
    /// Predicted execution time in milliseconds, per cloud.
    pub execution_time: BTreeMap<CloudTag, i64>,
    pub deadline: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    /// Preferred instance type. `None` means the cloud's default type.
    pub instance_flavour: Option<String>,
}

impl Job {
    /// Predicted execution time on `tag`, or zero when there is no estimate.
    pub fn estimate_ms(&self, tag: CloudTag) -> i64 {
        self.execution_time.get(&tag).copied().unwrap_or(0)
    }

    /// Execution time still outstanding on `tag` at `now`.
    ///
    /// Running jobs subtract the time elapsed since they started. The
    /// result never goes below zero.
    pub fn remaining_ms(&self, tag: CloudTag, now: DateTime<Utc>) -> i64 {
        let estimate = self.estimate_ms(tag);
        let remaining = match (self.state, self.started) {
            (JobState::Running, Some(started)) => {
                estimate.saturating_sub((now - started).num_milliseconds())
            }
            _ => estimate,
        };
        remaining.max(0)
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// Instant at which a running job on its assigned cloud completes.
    /// `None` when unstarted, unassigned, or past the representable range.
    pub fn finishes_at(&self) -> Option<DateTime<Utc>> {
        let tag = self.tag?;
        let started = self.started?;
        started.checked_add_signed(chrono::Duration::try_milliseconds(self.estimate_ms(tag))?)
    }
}

/// Convert a millisecond duration to fractional hours.
pub fn millis_to_hours(ms: i64) -> f64 {
    ms as f64 / MILLIS_PER_HOUR
}

// ── Instance ──────────────────────────────────────────────────────

/// Lifecycle state of a compute instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Active,
    Inactive,
    Starting,
}

/// A compute instance in a cloud's fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Empty until the cloud assigns one.
    pub id: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub state: InstanceState,
}

impl Instance {
    /// A not-yet-created instance request of the given type.
    pub fn request(instance_type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            instance_type: instance_type.into(),
            state: InstanceState::Starting,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == InstanceState::Active
    }

    pub fn is_inactive(&self) -> bool {
        self.state == InstanceState::Inactive
    }
}

/// An entry in a cloud's instance catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    pub name: String,
    /// Cost per hour of active use.
    pub price_increment: f64,
}

// ── Cloud ─────────────────────────────────────────────────────────

/// In-memory model of one cloud's fleet, catalog, and budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudState {
    pub name: String,
    /// Maximum simultaneous instances, ACTIVE and INACTIVE together.
    pub limit: usize,
    pub accept_tag: CloudTag,
    pub default_type: String,
    pub types: BTreeMap<String, InstanceType>,
    pub active_instances: Vec<Instance>,
    pub cost_limit: f64,
    pub money_used: f64,
}
