pub mod executor;
pub mod models;

pub use executor::ProbeExecutor;
pub use models::{InstanceAction, ProbeOutcome};
