//! # spot-exporter: Prometheus exporter for spot termination notices
//!
//! Cloud providers announce the reclaim of a spot instance a short time in advance through the
//! instance metadata service. `spot-exporter` turns that notice into metrics so that monitoring
//! and alerting pipelines get an early warning before the instance disappears.
//!
//! ## How it works
//!
//! Collection is pull-driven: every scrape of the metrics endpoint runs exactly one probe
//! against the metadata service (see [`probes`]) and maps the outcome to three gauges (see
//! [`metrics`]):
//!
//! | Metric                                         | Meaning                                      |
//! |------------------------------------------------|----------------------------------------------|
//! | `metadata_service_available`                   | 1 if the metadata service answered           |
//! | `termination_imminent{instance_action="..."}`  | 1 with the action when a notice is pending   |
//! | `termination_in`                               | seconds until the action, while in the future |
//!
//! Nothing is cached between scrapes and no probe failure ever fails the scrape: an unreachable
//! service reports `metadata_service_available 0`, a missing or undecodable notice reports
//! `termination_imminent{instance_action=""} 0`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use spot_exporter::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = spot_exporter::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     spot_exporter::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod config;
pub mod errors;
pub mod metrics;
pub mod probes;
pub mod telemetry;

#[cfg(test)]
mod test;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
pub use config::Config;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, error, info, instrument};

use crate::config::ProbeConfig;
use crate::errors::Error;
use crate::metrics::TerminationCollector;

/// State shared across request handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
}

/// Build a registry with the termination collector registered into it.
///
/// Construction happens on the blocking pool because the collector owns a blocking HTTP
/// client.
pub async fn create_registry(probe: &ProbeConfig) -> anyhow::Result<Registry> {
    let probe = probe.clone();
    let registry = tokio::task::spawn_blocking(move || -> Result<Registry, Error> {
        let registry = Registry::new();
        registry.register(Box::new(TerminationCollector::new(&probe)?))?;
        Ok(registry)
    })
    .await??;

    Ok(registry)
}

/// Build the HTTP router serving the exposition and a liveness check.
pub fn build_router(state: AppState, metrics_path: &str) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(metrics_path, get(render_metrics))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Gather the registry and encode it in the Prometheus text format.
///
/// Gathering runs the probe, which blocks for up to the probe timeout, so it is moved off
/// the async workers. Concurrent scrapes each get their own probe.
#[instrument(skip_all)]
async fn render_metrics(State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        let encoder = TextEncoder::new();
        let families = registry.gather();
        let mut buffer = vec![];
        encoder
            .encode(&families, &mut buffer)
            .map(|_| (encoder.format_type().to_string(), buffer))
    })
    .await;

    match rendered {
        Ok(Ok((content_type, body))) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Ok(Err(e)) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!("Metrics collection task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Main application struct that owns the router and configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the registry and registers the collector
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and answers scrapes until the
///    shutdown signal resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with the collector registered
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting spot exporter with configuration: {:#?}", config);

        let registry = create_registry(&config.probe).await?;
        info!(
            url = %config.probe.metadata_url,
            timeout = ?config.probe.timeout,
            "Registered termination collector"
        );

        let router = build_router(AppState { registry }, &config.metrics_path);
        Ok(Self { router, config })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Spot exporter listening on http://{}, metrics at {}",
            bind_addr, self.config.metrics_path
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Spot exporter stopped");
        Ok(())
    }
}
