//! Probe execution against the instance metadata service.
//!
//! This module provides the `ProbeExecutor` which issues the single GET of a
//! collection cycle and classifies the response. Every failure mode is folded
//! into a [`ProbeOutcome`], so nothing here returns an error once the executor
//! has been built.

use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::ProbeConfig;
use crate::errors::Error;
use crate::probes::models::ProbeOutcome;

/// Executes instance-action lookups against the metadata service.
///
/// The executor owns a blocking HTTP client whose timeout bounds the whole
/// exchange, body included. The client is stateless apart from its connection
/// pool, so one executor can serve concurrent collections.
pub struct ProbeExecutor {
    client: Client,
    metadata_url: Url,
}

impl ProbeExecutor {
    /// Create an executor for the configured endpoint and timeout.
    ///
    /// The blocking client runs its own runtime, so this must be called from a
    /// blocking context, never from within an async task.
    pub fn new(config: &ProbeConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            metadata_url: config.metadata_url.clone(),
        })
    }

    /// Run one probe and classify the response.
    ///
    /// No retries: the next scrape starts a fresh probe.
    #[instrument(skip(self), fields(url = %self.metadata_url))]
    pub fn execute(&self) -> ProbeOutcome {
        info!("Fetching termination data from metadata service");

        let response = match self.client.get(self.metadata_url.clone()).send() {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to fetch data from metadata service: {}", e);
                return ProbeOutcome::Unreachable;
            }
        };

        if response.status() == StatusCode::NOT_FOUND {
            debug!("instance-action endpoint not found");
            return ProbeOutcome::NoNotice;
        }

        // Any other status goes through the decode path, error statuses included
        let status = response.status();
        match response.bytes() {
            Ok(body) => ProbeOutcome::from_body(&body),
            Err(e) => {
                error!("HTTP {} - Failed to read instance-action response body: {}", status, e);
                ProbeOutcome::Unparseable
            }
        }
    }
}
