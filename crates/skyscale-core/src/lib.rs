//! skyscale-core: shared types for the autoscaling engine and simulator.
//!
//! Everything that more than one crate needs to agree on lives here: the job
//! and instance model, the `CloudTag` routing key, the pipeline parameter
//! codec that the estimator's regression features depend on, and the TOML
//! configuration that seeds a run.

pub mod config;
pub mod error;
pub mod params;
pub mod tag;
pub mod timestamp;
pub mod types;

pub use config::SkyscaleConfig;
pub use error::{ConfigError, ConfigResult};
pub use params::{FeatureMask, PipelineParameters};
pub use tag::{CloudTag, TagResolution};
pub use types::*;
