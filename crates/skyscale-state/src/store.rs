//! StateStore: redb-backed persistence for Skyscale runs.
//!
//! Provides the narrow sink the engine writes through: run lifecycle, fleet
//! events, scheduler telemetry, and the job history the estimator trains on.
//! All values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

const RUN_COUNTER: &str = "runs";

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for table in [RUNS, FLEET_EVENTS, SCHEDULER_EVENTS, JOB_HISTORY] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Helpers ────────────────────────────────────────────────────

    /// Increment a counter inside `txn` and return the new value.
    fn next_sequence(txn: &WriteTransaction, counter: &str) -> StateResult<u64> {
        let mut table = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        let next = table
            .get(counter)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0)
            + 1;
        table.insert(counter, next).map_err(map_err!(Write))?;
        Ok(next)
    }

    fn put_json<T: Serialize>(
        txn: &WriteTransaction,
        table: JsonTable,
        key: &str,
        value: &T,
    ) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let mut table = txn.open_table(table).map_err(map_err!(Table))?;
        table
            .insert(key, bytes.as_slice())
            .map_err(map_err!(Write))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// All values whose key starts with `prefix`, in key order.
    fn list_json<T: DeserializeOwned>(&self, table: JsonTable, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                results.push(serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?);
            }
        }
        Ok(results)
    }

    /// Append an event for `run_id` under the next per-run sequence number.
    fn append_event<T: Serialize>(
        &self,
        table: JsonTable,
        counter: &str,
        run_id: RunId,
        event: &T,
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let runs = txn.open_table(RUNS).map_err(map_err!(Table))?;
            if runs.get(run_key(run_id).as_str()).map_err(map_err!(Read))?.is_none() {
                return Err(StateError::NotFound(format!("run {run_id}")));
            }
        }
        let seq = Self::next_sequence(&txn, &format!("{counter}:{}", run_key(run_id)))?;
        Self::put_json(&txn, table, &event_key(run_id, seq), event)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Runs ───────────────────────────────────────────────────────

    /// Create a run and return its id.
    pub fn create_run(&self, name: &str, started: DateTime<Utc>) -> StateResult<RunId> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let id = Self::next_sequence(&txn, RUN_COUNTER)?;
        let record = RunRecord {
            id,
            name: name.to_string(),
            started,
            finished: None,
        };
        Self::put_json(&txn, RUNS, &run_key(id), &record)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(run = id, %name, "run created");
        Ok(id)
    }

    /// Stamp a run's end time. A run can only be ended once.
    pub fn end_run(&self, run_id: RunId, finished: DateTime<Utc>) -> StateResult<()> {
        let key = run_key(run_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut record: RunRecord = {
            let table = txn.open_table(RUNS).map_err(map_err!(Table))?;
            let guard = table
                .get(key.as_str())
                .map_err(map_err!(Read))?
                .ok_or_else(|| StateError::NotFound(format!("run {run_id}")))?;
            serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
        };
        if record.finished.is_some() {
            return Err(StateError::AlreadyExists(format!("end of run {run_id}")));
        }
        record.finished = Some(finished);
        Self::put_json(&txn, RUNS, &key, &record)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(run = run_id, "run ended");
        Ok(())
    }

    pub fn get_run(&self, run_id: RunId) -> StateResult<Option<RunRecord>> {
        self.get_json(RUNS, &run_key(run_id))
    }

    /// All runs, oldest first.
    pub fn list_runs(&self) -> StateResult<Vec<RunRecord>> {
        self.list_json(RUNS, "")
    }

    // ── Events ─────────────────────────────────────────────────────

    pub fn record_fleet_event(&self, event: &FleetEvent) -> StateResult<()> {
        self.append_event(FLEET_EVENTS, "fleet_events", event.run_id, event)?;
        debug!(
            run = event.run_id,
            cloud = %event.cloud_name,
            instance = %event.instance.id,
            event = %event.event_type,
            "fleet event recorded"
        );
        Ok(())
    }

    /// Fleet events of one run, in the order they were recorded.
    pub fn list_fleet_events(&self, run_id: RunId) -> StateResult<Vec<FleetEvent>> {
        self.list_json(FLEET_EVENTS, &event_prefix(run_id))
    }

    pub fn record_scheduler_event(&self, event: &SchedulerEvent) -> StateResult<()> {
        self.append_event(SCHEDULER_EVENTS, "scheduler_events", event.run_id, event)
    }

    /// Scheduler telemetry of one run, in the order it was recorded.
    pub fn list_scheduler_events(&self, run_id: RunId) -> StateResult<Vec<SchedulerEvent>> {
        self.list_json(SCHEDULER_EVENTS, &event_prefix(run_id))
    }

    // ── Job history ────────────────────────────────────────────────

    /// Insert or replace historical job records. Returns how many were written.
    pub fn put_historical_jobs(&self, records: &[JobRecord]) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for record in records {
            Self::put_json(&txn, JOB_HISTORY, &record.job_id, record)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = records.len(), "historical jobs stored");
        Ok(records.len())
    }

    pub fn load_historical_jobs(&self) -> StateResult<Vec<JobRecord>> {
        self.list_json(JOB_HISTORY, "")
    }
}
