//! Tracing initialization.
//!
//! Log output goes through a `tracing-subscriber` fmt layer. The level is controlled by the
//! standard `RUST_LOG` environment variable and defaults to `info`, e.g.
//!
//! ```bash
//! RUST_LOG=spot_exporter=debug,tower_http=info spot-exporter -f config.yaml
//! ```
//!
//! Library code only ever talks to the `tracing` facade, so nothing below the binary depends on
//! a subscriber being installed.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber has already been set.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
