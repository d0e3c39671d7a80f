//! # fairlens-api: HTTP Façade
//!
//! Axum service in front of the escrow state machine and the verifier
//! signing key.
//!
//! ## Routes
//!
//! - `/v1/escrows/*`: deploy escrows, call operations, lifecycle actions,
//!   snapshot and history reads
//! - `/v1/attest`, `/v1/verify-attestation`, `/v1/verifier`: signing service
//! - `/openapi.json`: generated OpenAPI document
//! - `/health/*`, `/metrics`: unauthenticated probes and Prometheus text
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → AuthLayer on `/v1` and `/openapi.json`.
//!
//! ## Crate Policy
//!
//! Handlers hold no escrow logic: they decode requests, lock one record and
//! hand the call to `fairlens-state`. Every error leaves through `AppError`.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod object_store;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the application router.
///
/// Health probes and `/metrics` are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::escrows::router())
        .merge(routes::attest::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config));

    let public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics::render));

    Router::new()
        .merge(public)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The service holds no external connections, so it is
/// ready as soon as it serves.
async fn readiness() -> &'static str {
    "ready"
}
