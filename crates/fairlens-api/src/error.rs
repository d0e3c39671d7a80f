//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Escrow rejections carry their [`ErrorKind`] and map to HTTP status in
//! one place: authorization failures are 403, lifecycle conflicts 409,
//! failed payouts 500, every other escrow rejection 400.
//!
//! 500-class messages are logged and replaced by a generic text. Key
//! material never appears in any message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fairlens_core::ErrorKind;
use fairlens_crypto::CryptoError;
use fairlens_state::{DecodeError, EscrowError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "MILESTONE_NOT_CURRENT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body could not be parsed, or hex material is malformed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request parsed but violates a field rule (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with an existing resource (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An escrow or signing operation was rejected.
    #[error("{message}")]
    Domain { kind: ErrorKind, message: String },

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Domain { kind, .. } => (domain_status(*kind), kind.code()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn is_internal(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::Domain { kind, .. } => kind.is_internal(),
            _ => false,
        }
    }
}

fn domain_status(kind: ErrorKind) -> StatusCode {
    if kind.is_authorization() {
        StatusCode::FORBIDDEN
    } else if kind.is_internal() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else if kind == ErrorKind::EscrowClosed {
        StatusCode::CONFLICT
    } else {
        StatusCode::BAD_REQUEST
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if self.is_internal() {
            tracing::error!(error = %self, code, "internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<EscrowError> for AppError {
    fn from(err: EscrowError) -> Self {
        Self::Domain {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        EscrowError::from(err).into()
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Encoding(e) => Self::Domain {
                kind: ErrorKind::Encoding,
                message: e.to_string(),
            },
            other => Self::BadRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairlens_core::Address;
    use fairlens_state::{PayoutError, Role};
    use http_body_util::BodyExt;

    #[test]
    fn plain_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).status_and_code(),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(
            AppError::Validation("x".into()).status_and_code(),
            (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_and_code(),
            (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED")
        );
    }

    #[test]
    fn escrow_unauthorized_is_forbidden() {
        let err: AppError = EscrowError::Unauthorized {
            operation: "add_milestone",
            caller: Address::new("mallory").unwrap(),
            required: Role::Owner,
        }
        .into();
        assert_eq!(err.status_and_code(), (StatusCode::FORBIDDEN, "UNAUTHORIZED"));
    }

    #[test]
    fn validation_kinds_are_bad_request() {
        for kind in [
            ErrorKind::InvalidArgs,
            ErrorKind::InvalidMilestone,
            ErrorKind::MilestoneNotCurrent,
            ErrorKind::ProofEmpty,
            ErrorKind::ProofMissing,
            ErrorKind::SignatureInvalid,
            ErrorKind::InvalidKey,
            ErrorKind::AttestationMismatch,
            ErrorKind::Encoding,
        ] {
            let err = AppError::Domain {
                kind,
                message: String::new(),
            };
            assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, kind.code()));
        }
    }

    #[test]
    fn closed_escrow_is_conflict() {
        let err = AppError::Domain {
            kind: ErrorKind::EscrowClosed,
            message: String::new(),
        };
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn payout_failure_hides_message() {
        let err: AppError = EscrowError::PayoutFailed(PayoutError::InsufficientFunds {
            requested: 10,
            available: 1,
        })
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "PAYOUT_FAILED");
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[test]
    fn crypto_errors_map() {
        let err: AppError = CryptoError::KeyError("short".into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
        let err: AppError =
            CryptoError::Encoding(fairlens_core::CodecError::DelimiterInField { field: "status" })
                .into();
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "ENCODING_ERROR"));
    }
}
