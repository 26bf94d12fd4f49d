//! skyscale-state: persistence sink for autoscaling and simulation runs.
//!
//! Backed by [redb](https://docs.rs/redb), records the runs themselves, every
//! fleet mutation a cloud performs (`CREATED`, `REUSED`, `DELETED`), the
//! per-tick scheduler telemetry, and the historical job records the estimator
//! trains on.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns. Event
//! keys are `{run_id}:{sequence}` with a zero-padded per-run sequence, so a
//! prefix scan returns a run's events in the order they were written.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared by concurrently executing runs.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
