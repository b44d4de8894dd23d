//! Data models for the instance metadata probe.
//!
//! Both types are built fresh for every collection and dropped once the samples
//! have been emitted.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{error, info};

/// A pending instance action as published by the metadata service.
///
/// Both fields are required: a body missing either one is not a notice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceAction {
    /// The scheduled action, e.g. `terminate`, `stop` or `hibernate`
    pub action: String,
    /// When the action will happen
    pub time: DateTime<Utc>,
}

impl InstanceAction {
    /// Seconds left until the action as seen from `now`.
    ///
    /// Returns `None` once the scheduled time is not strictly in the future.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<f64> {
        let delta = self.time - now;
        if delta <= TimeDelta::zero() {
            return None;
        }
        delta.to_std().ok().map(|d| d.as_secs_f64())
    }
}

/// Classified result of a single probe against the metadata service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No response at all: connection failure, DNS failure or timeout
    Unreachable,
    /// The service answered 404, there is no pending action
    NoNotice,
    /// The service answered but the body is not a notice
    Unparseable,
    /// A decoded notice
    Notice(InstanceAction),
}

impl ProbeOutcome {
    /// Decode a response body into an outcome.
    ///
    /// The `time` field may be present without being a time, so a body that
    /// does not decode is reported as "no notice" rather than as an error.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<InstanceAction>(body) {
            Ok(notice) => {
                info!("instance-action endpoint available, termination time: {}", notice.time);
                ProbeOutcome::Notice(notice)
            }
            Err(e) => {
                error!("Couldn't parse instance-action metadata: {}", e);
                ProbeOutcome::Unparseable
            }
        }
    }

    /// Whether the metadata service produced a response.
    pub fn service_available(&self) -> bool {
        !matches!(self, ProbeOutcome::Unreachable)
    }
}
