//! skyscale-scheduler: decides where jobs run and how many instances exist.
//!
//! An [`Algorithm`] takes the full job queue and the run's clouds, mutates
//! the clouds' fleets through the [`Cloud`](skyscale_cloud::Cloud) contract,
//! and returns the reordered queue together with the instances it activated.
//!
//! # Architecture
//!
//! ```text
//! CostAwareScheduler::run
//!   ├── place unassigned jobs      (cheapest vs fastest cloud, fastest wins)
//!   ├── per cloud with a queue
//!   │     ├── sort                  (RUNNING, priority desc, deadline asc)
//!   │     ├── admit                 (create or reuse until ACTIVE covers queue)
//!   │     └── trim                  (drop INACTIVE surplus)
//!   ├── reclaim idle clouds         (drop INACTIVE, keep ACTIVE)
//!   └── concatenate queues          (tag order, unplaced jobs last)
//! ```

pub mod algorithm;
pub mod cost_aware;
pub mod error;
pub mod passthrough;

pub use algorithm::{Algorithm, AlgorithmInput, AlgorithmOutput, sort_queue};
pub use cost_aware::CostAwareScheduler;
pub use error::{SchedulerError, SchedulerResult};
pub use passthrough::PassthroughScheduler;
