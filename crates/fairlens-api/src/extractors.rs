//! # Request Extraction & Validation
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and pass it through
//! [`extract_validated_json()`], so malformed JSON becomes a structured 400
//! and rule violations a 422 instead of axum's plain-text rejections.
//!
//! The field helpers turn request strings into domain values: caller
//! addresses and hex-encoded key or signature material.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use fairlens_core::Address;

use crate::error::AppError;

/// Request types with rules beyond what serde checks.
pub trait Validate {
    /// Check field rules. The message names the offending field.
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body, turning rejections into [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match result {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
    }
}

/// Unwrap a JSON body and run its [`Validate`] rules.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse the `caller` field of an escrow request.
pub fn caller_address(raw: &str) -> Result<Address, AppError> {
    Address::new(raw).map_err(|e| AppError::Validation(format!("caller: {e}")))
}

/// Decode a hex request field. Malformed hex is a 400.
pub fn hex_field(field: &str, raw: &str) -> Result<Vec<u8>, AppError> {
    fairlens_crypto::hex::decode(raw)
        .map_err(|_| AppError::BadRequest(format!("{field} is not valid hex")))
}
