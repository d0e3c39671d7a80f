//! # Verifier Signing Service
//!
//! Signs milestone attestations with the verifier key held by this
//! process, checks attestations signed elsewhere, and publishes the
//! verifier public key that escrows are deployed with.
//!
//! Attestation metadata goes to the object store. A store failure is
//! logged and the signed attestation is returned without a content id.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use fairlens_core::{AppId, STATUS_PASS};
use fairlens_crypto::{verify_detailed, AttestationRequest, SignedAttestation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, hex_field, Validate};
use crate::state::AppState;

fn default_status() -> String {
    STATUS_PASS.to_string()
}

/// Fields of the attestation to sign.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AttestRequest {
    pub app_id: u64,
    pub milestone_index: u64,
    #[serde(default = "default_status")]
    #[schema(example = "PASS")]
    pub status: String,
    pub milestone_hash: String,
    #[serde(default)]
    pub proof_hash: String,
    /// Unix seconds. Defaults to now.
    #[serde(default)]
    pub timestamp: Option<u64>,
    /// Inspection evidence stored off-ledger.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Validate for AttestRequest {
    fn validate(&self) -> Result<(), String> {
        if self.status.trim().is_empty() {
            return Err("status must not be empty".to_string());
        }
        if self.milestone_hash.trim().is_empty() {
            return Err("milestone_hash must not be empty".to_string());
        }
        Ok(())
    }
}

impl From<&AttestRequest> for AttestationRequest {
    fn from(req: &AttestRequest) -> Self {
        Self {
            app_id: AppId::new(req.app_id),
            milestone_index: req.milestone_index,
            status: req.status.clone(),
            milestone_hash: req.milestone_hash.clone(),
            proof_hash: req.proof_hash.clone(),
            timestamp: req.timestamp,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttestResponse {
    #[schema(value_type = Object)]
    pub attestation: SignedAttestation,
    /// Content id of the stored metadata, if any was supplied and stored.
    pub metadata_cid: Option<String>,
}

/// An attestation to check.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyAttestationRequest {
    /// Canonical message text, verified byte for byte.
    pub message: String,
    /// Hex-encoded 64-byte signature.
    pub signature: String,
    /// Hex-encoded 32-byte public key.
    pub public_key: String,
}

impl Validate for VerifyAttestationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.signature.trim().is_empty() {
            return Err("signature must not be empty".to_string());
        }
        if self.public_key.trim().is_empty() {
            return Err("public_key must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyAttestationResponse {
    pub valid: bool,
    /// `malformed_key`, `malformed_signature` or `mismatch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifierResponse {
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
}

/// Build the attestation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/attest", post(attest))
        .route("/v1/verify-attestation", post(verify_attestation))
        .route("/v1/verifier", get(verifier))
}

/// POST /v1/attest: Sign a milestone attestation.
#[utoipa::path(
    post,
    path = "/v1/attest",
    request_body = AttestRequest,
    responses(
        (status = 200, description = "Attestation signed", body = AttestResponse),
        (status = 400, description = "Field contains the message delimiter", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "attestations"
)]
pub(crate) async fn attest(
    State(state): State<AppState>,
    body: Result<Json<AttestRequest>, JsonRejection>,
) -> Result<Json<AttestResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let attestation = state
        .signer
        .sign_attestation(&AttestationRequest::from(&req))?;

    let metadata_cid = req.metadata.as_ref().and_then(|doc| {
        state
            .object_store
            .put(doc)
            .inspect_err(|e| {
                tracing::warn!(
                    app_id = req.app_id,
                    milestone_index = req.milestone_index,
                    error = %e,
                    "attestation metadata not stored"
                );
            })
            .ok()
    });

    Ok(Json(AttestResponse {
        attestation,
        metadata_cid,
    }))
}

/// POST /v1/verify-attestation: Check a signature over a message.
#[utoipa::path(
    post,
    path = "/v1/verify-attestation",
    request_body = VerifyAttestationRequest,
    responses(
        (status = 200, description = "Verification result", body = VerifyAttestationResponse),
        (status = 400, description = "Malformed hex", body = crate::error::ErrorBody),
    ),
    tag = "attestations"
)]
pub(crate) async fn verify_attestation(
    body: Result<Json<VerifyAttestationRequest>, JsonRejection>,
) -> Result<Json<VerifyAttestationResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let signature = hex_field("signature", &req.signature)?;
    let public_key = hex_field("public_key", &req.public_key)?;

    let response = match verify_detailed(&public_key, req.message.as_bytes(), &signature) {
        Ok(()) => VerifyAttestationResponse {
            valid: true,
            failure: None,
        },
        Err(e) => {
            tracing::debug!(failure = e.label(), "attestation did not verify");
            VerifyAttestationResponse {
                valid: false,
                failure: Some(e.label().to_string()),
            }
        }
    };
    Ok(Json(response))
}

/// GET /v1/verifier: The verifier public key.
#[utoipa::path(
    get,
    path = "/v1/verifier",
    responses((status = 200, description = "Verifier public key", body = VerifierResponse)),
    tag = "attestations"
)]
pub(crate) async fn verifier(State(state): State<AppState>) -> Json<VerifierResponse> {
    Json(VerifierResponse {
        public_key: state.signer.public_key().to_hex(),
    })
}
