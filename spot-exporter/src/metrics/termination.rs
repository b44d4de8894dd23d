//! Termination notice metrics.
//!
//! A custom Prometheus collector that probes the metadata service on every
//! scrape and reports three gauges:
//! - `metadata_service_available`: whether the service answered at all
//! - `termination_imminent{instance_action}`: whether a notice is pending
//! - `termination_in`: seconds until the pending action, while it is in the future
//!
//! Gauges are built fresh on every collection, so concurrent scrapes never see
//! each other's values.

use chrono::{DateTime, Utc};
use prometheus::core::{Collector, Desc, Describer};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts};
use tracing::{error, instrument};

use crate::config::ProbeConfig;
use crate::errors::Error;
use crate::probes::{ProbeExecutor, ProbeOutcome};

pub const SERVICE_AVAILABLE: &str = "metadata_service_available";
pub const TERMINATION_IMMINENT: &str = "termination_imminent";
pub const TERMINATION_IN: &str = "termination_in";
pub const INSTANCE_ACTION_LABEL: &str = "instance_action";

/// Pull-driven collector for spot termination notices.
pub struct TerminationCollector {
    executor: ProbeExecutor,
    service_available: Opts,
    termination_imminent: Opts,
    termination_in: Opts,
    descs: Vec<Desc>,
}

impl TerminationCollector {
    /// Create a collector probing the configured endpoint.
    ///
    /// Must be called from a blocking context, see [`ProbeExecutor::new`].
    pub fn new(config: &ProbeConfig) -> Result<Self, Error> {
        Self::with_executor(ProbeExecutor::new(config)?)
    }

    pub fn with_executor(executor: ProbeExecutor) -> Result<Self, Error> {
        let service_available = Opts::new(SERVICE_AVAILABLE, "Metadata service available");
        let termination_imminent =
            Opts::new(TERMINATION_IMMINENT, "Instance is about to be terminated").variable_label(INSTANCE_ACTION_LABEL);
        let termination_in = Opts::new(TERMINATION_IN, "Instance will be terminated in");

        let descs = [&service_available, &termination_imminent, &termination_in]
            .into_iter()
            .map(|opts| opts.describe())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            executor,
            service_available,
            termination_imminent,
            termination_in,
            descs,
        })
    }

    /// Translate a probe outcome into metric families as observed at `now`.
    pub fn families(&self, outcome: &ProbeOutcome, now: DateTime<Utc>) -> prometheus::Result<Vec<MetricFamily>> {
        let mut families = Vec::with_capacity(self.descs.len());

        let available = Gauge::with_opts(self.service_available.clone())?;
        available.set(if outcome.service_available() { 1.0 } else { 0.0 });
        families.extend(available.collect());

        match outcome {
            ProbeOutcome::Unreachable => {}
            ProbeOutcome::NoNotice | ProbeOutcome::Unparseable => {
                families.extend(self.imminent(0.0, "")?);
            }
            ProbeOutcome::Notice(notice) => {
                families.extend(self.imminent(1.0, &notice.action)?);

                if let Some(remaining) = notice.remaining(now) {
                    let termination_in = Gauge::with_opts(self.termination_in.clone())?;
                    termination_in.set(remaining);
                    families.extend(termination_in.collect());
                }
            }
        }

        Ok(families)
    }

    fn imminent(&self, value: f64, action: &str) -> prometheus::Result<Vec<MetricFamily>> {
        let imminent = GaugeVec::new(self.termination_imminent.clone(), &[INSTANCE_ACTION_LABEL])?;
        imminent.with_label_values(&[action]).set(value);
        Ok(imminent.collect())
    }
}

impl Collector for TerminationCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    #[instrument(skip_all)]
    fn collect(&self) -> Vec<MetricFamily> {
        let outcome = self.executor.execute();
        match self.families(&outcome, Utc::now()) {
            Ok(families) => families,
            Err(e) => {
                error!("Failed to build termination metrics: {}", e);
                Vec::new()
            }
        }
    }
}
