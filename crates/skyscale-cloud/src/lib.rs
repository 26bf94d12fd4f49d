//! skyscale-cloud: the cloud abstraction the scheduler and simulator drive.
//!
//! [`Cloud`] is the capability contract: fleet listing, the instance catalog,
//! the instance limit, fleet mutation (`add_instance` / `delete_instance`)
//! and the cost and duration queries used for placement and admission.
//! [`SimCloud`] implements it over an in-memory [`CloudState`] and records
//! every fleet mutation in the state store.
//!
//! [`CloudState`]: skyscale_core::CloudState

pub mod cloud;
pub mod error;
pub mod sim;

pub use cloud::{Cloud, CloudCollection};
pub use error::{CloudError, CloudResult};
pub use sim::{SimCloud, sim_clouds};
