//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `SPOT_EXPORTER_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`, optional)
//! 2. **Environment variables** - Variables prefixed with `SPOT_EXPORTER_` override YAML values
//!
//! For nested values use double underscores, e.g. `SPOT_EXPORTER_PROBE__TIMEOUT=500ms` sets
//! `probe.timeout`.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use spot_exporter::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Serving metrics on {}{}", config.bind_address(), config.metrics_path);
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Instance-action endpoint of the EC2 instance metadata service
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/latest/meta-data/spot/instance-action";

/// Probes run inline with a scrape, anything longer stalls the scraper
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const HEALTH_PATH: &str = "/healthz";

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SPOT_EXPORTER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults, so an empty or missing file yields a working exporter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Path the Prometheus exposition is served on
    pub metrics_path: String,
    /// Metadata probe settings
    pub probe: ProbeConfig,
}

/// Where and how to probe for termination notices.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Instance-action endpoint to query on every scrape
    pub metadata_url: Url,
    /// Bound on the whole request, body included
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9189,
            metrics_path: "/metrics".to_string(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            metadata_url: Url::parse(DEFAULT_METADATA_URL).expect("default metadata URL is valid"),
            timeout: Duration::from_secs(1),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // The config path itself is a CLI concern, not a config value
            .merge(Env::prefixed("SPOT_EXPORTER_").split("__").ignore(&["config"]))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        if !self.metrics_path.starts_with('/') {
            return Err(Error::config(format!(
                "metrics_path must start with '/', got '{}'",
                self.metrics_path
            )));
        }

        if self.metrics_path == HEALTH_PATH {
            return Err(Error::config(format!("metrics_path cannot be {}, it is reserved", HEALTH_PATH)));
        }

        match self.probe.metadata_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::config(format!(
                    "probe.metadata_url must use http or https, got '{}'",
                    scheme
                )));
            }
        }

        if self.probe.timeout.is_zero() {
            return Err(Error::config("probe.timeout must be greater than zero"));
        }

        if self.probe.timeout > MAX_PROBE_TIMEOUT {
            return Err(Error::config(format!(
                "probe.timeout ({:?}) is too long (maximum {:?})",
                self.probe.timeout, MAX_PROBE_TIMEOUT
            )));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
