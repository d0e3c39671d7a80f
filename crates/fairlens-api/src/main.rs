//! # fairlens-api: Binary Entry Point
//!
//! Reads configuration from the environment, installs the Prometheus
//! recorder and serves the API. Binds to `PORT` (default 8080).

use anyhow::Context;
use fairlens_api::{AppConfig, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let port = config.port;
    let state = AppState::with_config(config)
        .context("failed to build application state")?
        .with_metrics(handle);
    tracing::info!(
        verifier = %state.signer.public_key(),
        policy = %state.config.escrow_config.attestation_policy,
        "verifier key loaded"
    );

    let app = fairlens_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("FairLens API listening on {}", addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
