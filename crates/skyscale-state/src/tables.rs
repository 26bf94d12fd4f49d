//! redb table definitions for the Skyscale state store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized).
//! Event keys follow `{run_id}:{sequence}`, both zero-padded.

use redb::TableDefinition;

/// Table of JSON-serialized records.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Runs keyed by `{run_id}`.
pub const RUNS: JsonTable = TableDefinition::new("runs");

/// Fleet events keyed by `{run_id}:{sequence}`.
pub const FLEET_EVENTS: JsonTable = TableDefinition::new("fleet_events");

/// Scheduler telemetry keyed by `{run_id}:{sequence}`.
pub const SCHEDULER_EVENTS: JsonTable = TableDefinition::new("scheduler_events");

/// Historical finished jobs keyed by `{job_id}`.
pub const JOB_HISTORY: JsonTable = TableDefinition::new("job_history");

/// Monotonic counters: `runs` for run ids, `{table}:{run_id}` for event sequences.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
