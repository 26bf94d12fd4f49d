//! skyscale-sim: replays the scheduling loop over simulated time.
//!
//! Each tick releases the jobs that have arrived, runs the scheduling
//! algorithm, starts jobs on free ACTIVE instances, finishes jobs whose
//! predicted execution time has elapsed, and records per-cloud telemetry.
//! A run always executes every configured tick; an error aborts it and
//! leaves it without an end timestamp.

pub mod error;
pub mod simulator;

pub use error::{SimError, SimResult};
pub use simulator::{SimulationSettings, Simulator, TickSnapshot};
