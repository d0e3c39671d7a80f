//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented handlers into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FairLens Escrow API",
        version = "0.1.0",
        description = "Milestone escrow released against Ed25519 verifier attestations, with the verifier signing service."
    ),
    paths(
        // Escrows
        crate::routes::escrows::create_escrow,
        crate::routes::escrows::list_escrows,
        crate::routes::escrows::get_escrow,
        crate::routes::escrows::get_history,
        crate::routes::escrows::call_escrow,
        crate::routes::escrows::apply_lifecycle,
        // Attestations
        crate::routes::attest::attest,
        crate::routes::attest::verify_attestation,
        crate::routes::attest::verifier,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::escrows::CreateEscrowRequest,
        crate::routes::escrows::CallRequest,
        crate::routes::escrows::LifecycleRequest,
        crate::routes::escrows::CustodySummary,
        crate::routes::escrows::EscrowView,
        crate::routes::escrows::CallResponse,
        crate::routes::escrows::LifecycleResponse,
        crate::routes::escrows::HistoryResponse,
        crate::routes::attest::AttestRequest,
        crate::routes::attest::AttestResponse,
        crate::routes::attest::VerifyAttestationRequest,
        crate::routes::attest::VerifyAttestationResponse,
        crate::routes::attest::VerifierResponse,
    )),
    tags(
        (name = "escrows", description = "Escrow deployment, calls and queries"),
        (name = "attestations", description = "Verifier signing and attestation checks"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
