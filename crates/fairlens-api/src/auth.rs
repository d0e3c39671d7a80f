//! # Bearer Authentication
//!
//! A single shared bearer token guards the `/v1` routes. Escrow roles
//! (owner, contractor) are not authentication: they are checked by the
//! state machine against the `caller` named in each request.
//!
//! When no token is configured every request passes. Health probes and
//! `/metrics` are mounted outside this middleware.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use crate::error::{ErrorBody, ErrorDetail};

/// Auth configuration injected into request extensions.
///
/// `Debug` redacts the token.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time token comparison. A length mismatch still runs one
/// comparison so timing does not reveal the expected length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Reject requests whose `Authorization: Bearer` token does not match
/// the configured one.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());

    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(Some(token)) if constant_time_token_eq(token, &expected) => next.run(request).await,
        Some(Some(_)) => {
            tracing::warn!(path = %request.uri().path(), "authentication failed: invalid bearer token");
            unauthorized_response("invalid bearer token")
        }
        Some(None) => {
            tracing::warn!(path = %request.uri().path(), "authentication failed: non-Bearer scheme");
            unauthorized_response("authorization header must use Bearer scheme")
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "authentication failed: missing header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHENTICATED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
