//! # Prometheus Metrics
//!
//! Escrow counters recorded through the `metrics` facade. Without an
//! installed recorder the macros are no-ops, so handlers record
//! unconditionally. `main` installs the Prometheus recorder and the
//! handle renders at `/metrics`.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use fairlens_core::ErrorKind;

use crate::error::AppError;
use crate::state::AppState;

pub const OPERATIONS_TOTAL: &str = "fairlens_operations_total";
pub const OPERATION_FAILURES_TOTAL: &str = "fairlens_operation_failures_total";
pub const RELEASES_TOTAL: &str = "fairlens_releases_total";
pub const PAYOUT_AMOUNT_TOTAL: &str = "fairlens_payout_amount_total";

/// Count an applied escrow operation.
pub fn record_operation(operation: &'static str) {
    ::metrics::counter!(OPERATIONS_TOTAL, "operation" => operation).increment(1);
}

/// Count a rejected escrow operation by error code.
pub fn record_failure(operation: &'static str, kind: ErrorKind) {
    ::metrics::counter!(
        OPERATION_FAILURES_TOTAL,
        "operation" => operation,
        "code" => kind.code()
    )
    .increment(1);
}

/// Count a released milestone and the amount paid for it.
pub fn record_release(amount: u64) {
    ::metrics::counter!(RELEASES_TOTAL).increment(1);
    ::metrics::counter!(PAYOUT_AMOUNT_TOTAL).increment(amount);
}

/// GET /metrics: Prometheus text exposition.
pub async fn render(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::NotFound("metrics recorder not installed".into()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn counters_render_in_exposition() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            record_operation("submit_proof");
            record_failure("verify_release", ErrorKind::SignatureInvalid);
            record_release(250);
        });
        let text = handle.render();
        assert!(text.contains(OPERATIONS_TOTAL));
        assert!(text.contains("code=\"SIGNATURE_INVALID\""));
        assert!(text.contains(&format!("{PAYOUT_AMOUNT_TOTAL} 250")));
    }
}
