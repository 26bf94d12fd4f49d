//! Records persisted by the Skyscale state store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyscale_core::{CloudTag, Instance, InstanceType, PipelineParameters};

/// Store-assigned run identifier.
pub type RunId = u64;

// ── Runs ───────────────────────────────────────────────────────────

/// One autoscaling or simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub name: String,
    pub started: DateTime<Utc>,
    /// `None` while running, and forever for runs that aborted.
    pub finished: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

// ── Fleet events ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FleetEventType {
    Created,
    Reused,
    Deleted,
}

impl std::fmt::Display for FleetEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FleetEventType::Created => "CREATED",
            FleetEventType::Reused => "REUSED",
            FleetEventType::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// A mutation of one cloud's fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetEvent {
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    pub instance: Instance,
    pub instance_type: InstanceType,
    pub event_type: FleetEventType,
    pub cloud_name: String,
}

// ── Scheduler telemetry ────────────────────────────────────────────

/// Per-cloud, per-tick telemetry written by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerEvent {
    pub run_id: RunId,
    /// Projected makespan of the cloud's queue after the tick.
    pub queue_duration_ms: i64,
    pub timestamp: DateTime<Utc>,
    pub tag: CloudTag,
    pub cost_before: f64,
    pub cost_after: f64,
    /// Spend accrued by the cloud so far in this run.
    pub money_used: f64,
}

// ── Job history ────────────────────────────────────────────────────

/// A finished job, used as a regression training sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    /// Raw tag as reported by the job service. Resolved on load.
    pub tag: String,
    pub runtime_ms: i64,
    pub queue_duration_ms: i64,
    pub input_data_size: i64,
    #[serde(default)]
    pub parameters: PipelineParameters,
}

pub(crate) fn run_key(id: RunId) -> String {
    format!("{id:010}")
}

pub(crate) fn event_key(run_id: RunId, seq: u64) -> String {
    format!("{}:{seq:010}", run_key(run_id))
}

pub(crate) fn event_prefix(run_id: RunId) -> String {
    format!("{}:", run_key(run_id))
}
