//! Prometheus metrics exposed by the exporter.
//!
//! The termination collector is the only source of samples; it is registered
//! into the application's registry at startup.

mod termination;

pub use termination::{
    INSTANCE_ACTION_LABEL, SERVICE_AVAILABLE, TERMINATION_IMMINENT, TERMINATION_IN, TerminationCollector,
};
