//! `server`: token-gated HTTP service entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from the environment (and `.env`).
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Create the Prometheus registry.
//! 4. Build the auth gateway and both routers.
//! 5. Run the listeners until SIGINT/SIGTERM, then drain them.

mod auth;
mod config;
mod lifecycle;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use tracing::{debug, error, info, info_span, warn};

use auth::AuthGateway;
use config::Config;
use lifecycle::{ListenerProcess, Orchestrator};
use server::middleware::RequestLogger;
use telemetry::HttpMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let (cfg, dotenv_loaded) = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    let _telemetry =
        telemetry::init_telemetry(&cfg.log_level, cfg.otel_exporter_otlp_endpoint.as_deref())?;
    if dotenv_loaded {
        info!("loaded environment from .env");
    } else {
        warn!("no .env file found, using process environment only");
    }
    info!(
        version = %cfg.app_version,
        commit = %cfg.git_commit_sha,
        "server starting"
    );
    debug!(config = ?cfg, "configuration loaded");

    // -----------------------------------------------------------------------
    // 3. Metrics registry
    // -----------------------------------------------------------------------
    let metrics = HttpMetrics::new(&cfg.app_version, &cfg.git_commit_sha)
        .context("failed to create metrics registry")?;

    // -----------------------------------------------------------------------
    // 4. Routers and listeners
    // -----------------------------------------------------------------------
    let gateway = AuthGateway::new(&cfg.jwt_public_key, info_span!("auth"));
    let app = server::router::build(
        gateway,
        metrics.clone(),
        RequestLogger::new(info_span!("http")),
    );
    let primary = ListenerProcess::new(
        "primary",
        cfg.primary_endpoint(),
        app,
        info_span!("listener", name = "primary"),
    );

    let metrics_endpoint = cfg.metrics_endpoint();
    let metrics_listener = if metrics_endpoint.enabled {
        Some(ListenerProcess::new(
            "metrics",
            metrics_endpoint,
            server::router::build_metrics(metrics),
            info_span!("listener", name = "metrics"),
        ))
    } else {
        info!("metrics listener disabled");
        None
    };

    // -----------------------------------------------------------------------
    // 5. Serve until terminated
    // -----------------------------------------------------------------------
    let mut orchestrator = Orchestrator::new(primary, metrics_listener, info_span!("lifecycle"));
    if let Err(e) = orchestrator.run(lifecycle::signals::terminate_signal()).await {
        error!(error = %e, "server terminated abnormally");
        return Err(e.into());
    }

    info!(state = ?orchestrator.state(), "server stopped");
    Ok(())
}
