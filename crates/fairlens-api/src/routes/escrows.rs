//! # Escrow API
//!
//! Deploys escrows, forwards operation calls to the state machine and
//! serves the indexer-style reads (current snapshot, transition history,
//! payouts).
//!
//! A call runs against a clone of the stored record under the store's
//! write lock. The clone replaces the record only when the state machine
//! accepted the operation and any companion payment was credited.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fairlens_core::AppId;
use fairlens_state::{
    CallOutcome, CustodialAccount, Escrow, EscrowError, EscrowSnapshot, EscrowStatus,
    LifecycleAction, OperationKind, PayoutError, PayoutReceipt, TransitionRecord,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::{caller_address, extract_validated_json, Validate};
use crate::metrics;
use crate::state::{AppState, EscrowRecord};

const MAX_ARG_LEN: usize = 4096;
const MAX_ARGS: usize = 8;

fn validate_args(args: &[String]) -> Result<(), String> {
    if args.len() > MAX_ARGS {
        return Err(format!("args must not exceed {MAX_ARGS} entries"));
    }
    if args.iter().any(|a| a.len() > MAX_ARG_LEN) {
        return Err(format!("each arg must not exceed {MAX_ARG_LEN} characters"));
    }
    Ok(())
}

// -- Request / response types -------------------------------------------------

/// Deploy a new escrow.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEscrowRequest {
    /// Application id. Allocated by the server when omitted.
    #[serde(default)]
    pub app_id: Option<u64>,
    /// `[owner, contractor, verifier_public_key_hex]`.
    pub args: Vec<String>,
}

impl Validate for CreateEscrowRequest {
    fn validate(&self) -> Result<(), String> {
        validate_args(&self.args)
    }
}

/// An operation call against a deployed escrow.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CallRequest {
    pub caller: String,
    /// `[operation_name, args…]`.
    pub args: Vec<String>,
    /// Companion payment credited to the custodial account. Only accepted
    /// with `fund_escrow`.
    #[serde(default)]
    pub payment: Option<u64>,
}

impl Validate for CallRequest {
    fn validate(&self) -> Result<(), String> {
        if self.caller.trim().is_empty() {
            return Err("caller must not be empty".to_string());
        }
        validate_args(&self.args)
    }
}

/// Application lifecycle request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LifecycleRequest {
    pub caller: String,
    #[schema(value_type = String, example = "delete")]
    pub action: LifecycleAction,
}

impl Validate for LifecycleRequest {
    fn validate(&self) -> Result<(), String> {
        if self.caller.trim().is_empty() {
            return Err("caller must not be empty".to_string());
        }
        Ok(())
    }
}

/// Custodial funds held for one escrow.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustodySummary {
    pub balance: u64,
    pub total_credited: u64,
    pub total_paid: u64,
}

impl From<&CustodialAccount> for CustodySummary {
    fn from(account: &CustodialAccount) -> Self {
        Self {
            balance: account.balance(),
            total_credited: account.total_credited(),
            total_paid: account.total_paid(),
        }
    }
}

/// Current view of an escrow.
#[derive(Debug, Serialize, ToSchema)]
pub struct EscrowView {
    pub app_id: u64,
    #[schema(value_type = Object)]
    pub snapshot: EscrowSnapshot,
    pub custody: CustodySummary,
}

impl From<&EscrowRecord> for EscrowView {
    fn from(record: &EscrowRecord) -> Self {
        Self {
            app_id: record.escrow.app_id().value(),
            snapshot: record.escrow.snapshot(),
            custody: CustodySummary::from(&record.custody),
        }
    }
}

/// Result of an accepted call.
#[derive(Debug, Serialize, ToSchema)]
pub struct CallResponse {
    pub app_id: u64,
    #[schema(value_type = Object)]
    pub outcome: CallOutcome,
    pub custody: CustodySummary,
}

/// Result of an accepted lifecycle action.
#[derive(Debug, Serialize, ToSchema)]
pub struct LifecycleResponse {
    pub app_id: u64,
    #[schema(value_type = Object)]
    pub status: EscrowStatus,
}

/// Audit trail of an escrow.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub app_id: u64,
    #[schema(value_type = Vec<Object>)]
    pub transitions: Vec<TransitionRecord>,
    #[schema(value_type = Vec<Object>)]
    pub payouts: Vec<PayoutReceipt>,
    pub custody: CustodySummary,
}

// -- Router -------------------------------------------------------------------

/// Build the escrows router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/escrows", post(create_escrow).get(list_escrows))
        .route("/v1/escrows/{app_id}", get(get_escrow))
        .route("/v1/escrows/{app_id}/history", get(get_history))
        .route("/v1/escrows/{app_id}/calls", post(call_escrow))
        .route("/v1/escrows/{app_id}/lifecycle", post(apply_lifecycle))
}

fn not_found(app_id: AppId) -> AppError {
    AppError::NotFound(format!("escrow {app_id} not found"))
}

/// POST /v1/escrows: Deploy an escrow.
#[utoipa::path(
    post,
    path = "/v1/escrows",
    request_body = CreateEscrowRequest,
    responses(
        (status = 201, description = "Escrow created", body = EscrowView),
        (status = 400, description = "Invalid create arguments", body = crate::error::ErrorBody),
        (status = 409, description = "App id already in use", body = crate::error::ErrorBody),
    ),
    tag = "escrows"
)]
pub(crate) async fn create_escrow(
    State(state): State<AppState>,
    body: Result<Json<CreateEscrowRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EscrowView>), AppError> {
    let req = extract_validated_json(body)?;
    let app_id = match req.app_id {
        Some(id) => AppId::new(id),
        None => state.allocate_app_id(),
    };

    let escrow = Escrow::create(app_id, &req.args, state.config.escrow_config.clone())
        .inspect_err(|e| metrics::record_failure("create", e.kind()))?;
    let record = EscrowRecord::new(escrow);
    let view = EscrowView::from(&record);

    if !state.escrows.insert_new(app_id, record) {
        return Err(AppError::Conflict(format!("escrow {app_id} already exists")));
    }
    metrics::record_operation("create");
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /v1/escrows: List deployed escrows.
#[utoipa::path(
    get,
    path = "/v1/escrows",
    responses((status = 200, description = "All escrows, by app id", body = Vec<EscrowView>)),
    tag = "escrows"
)]
pub(crate) async fn list_escrows(State(state): State<AppState>) -> Json<Vec<EscrowView>> {
    let mut views: Vec<EscrowView> = state.escrows.list().iter().map(EscrowView::from).collect();
    views.sort_by_key(|v| v.app_id);
    Json(views)
}

/// GET /v1/escrows/{app_id}: Current escrow state.
#[utoipa::path(
    get,
    path = "/v1/escrows/{app_id}",
    params(("app_id" = u64, Path, description = "Application id")),
    responses(
        (status = 200, description = "Escrow found", body = EscrowView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "escrows"
)]
pub(crate) async fn get_escrow(
    State(state): State<AppState>,
    Path(app_id): Path<u64>,
) -> Result<Json<EscrowView>, AppError> {
    let app_id = AppId::new(app_id);
    let record = state.escrows.get(&app_id).ok_or_else(|| not_found(app_id))?;
    Ok(Json(EscrowView::from(&record)))
}

/// GET /v1/escrows/{app_id}/history: Transitions and payouts.
#[utoipa::path(
    get,
    path = "/v1/escrows/{app_id}/history",
    params(("app_id" = u64, Path, description = "Application id")),
    responses(
        (status = 200, description = "Audit trail", body = HistoryResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "escrows"
)]
pub(crate) async fn get_history(
    State(state): State<AppState>,
    Path(app_id): Path<u64>,
) -> Result<Json<HistoryResponse>, AppError> {
    let app_id = AppId::new(app_id);
    let record = state.escrows.get(&app_id).ok_or_else(|| not_found(app_id))?;
    Ok(Json(HistoryResponse {
        app_id: app_id.value(),
        transitions: record.escrow.history().to_vec(),
        payouts: record.escrow.payouts().to_vec(),
        custody: CustodySummary::from(&record.custody),
    }))
}

/// POST /v1/escrows/{app_id}/calls: Execute an operation.
#[utoipa::path(
    post,
    path = "/v1/escrows/{app_id}/calls",
    params(("app_id" = u64, Path, description = "Application id")),
    request_body = CallRequest,
    responses(
        (status = 200, description = "Operation applied", body = CallResponse),
        (status = 400, description = "Rejected by the escrow", body = crate::error::ErrorBody),
        (status = 403, description = "Caller lacks the required role", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Escrow closed", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "escrows"
)]
pub(crate) async fn call_escrow(
    State(state): State<AppState>,
    Path(app_id): Path<u64>,
    body: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<CallResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let app_id = AppId::new(app_id);
    let caller = caller_address(&req.caller)?;

    let kind = OperationKind::from_args(req.args.as_slice()).map_err(|e| {
        metrics::record_failure("decode", e.kind());
        AppError::from(e)
    })?;
    if req.payment.is_some() && kind != OperationKind::FundEscrow {
        return Err(AppError::Validation(format!(
            "payment is only accepted with fund_escrow, not {}",
            kind.name()
        )));
    }
    let name = kind.name();

    let result = state
        .escrows
        .try_update(&app_id, |record| {
            let mut staged = record.clone();
            let outcome = staged
                .escrow
                .call(&caller, req.args.as_slice(), &mut staged.custody)?;
            if let Some(amount) = req.payment {
                staged
                    .custody
                    .credit(amount)
                    .map_err(EscrowError::PayoutFailed)?;
                tracing::info!(%app_id, amount, balance = staged.custody.balance(), "custodial account funded");
            }
            let custody = CustodySummary::from(&staged.custody);
            *record = staged;
            Ok::<_, EscrowError>((outcome, custody))
        })
        .ok_or_else(|| not_found(app_id))?;

    match result {
        Ok((outcome, custody)) => {
            metrics::record_operation(name);
            if let CallOutcome::Released { receipt, .. } = &outcome {
                metrics::record_release(receipt.amount);
            }
            Ok(Json(CallResponse {
                app_id: app_id.value(),
                outcome,
                custody,
            }))
        }
        Err(e) => {
            metrics::record_failure(name, e.kind());
            if matches!(e, EscrowError::PayoutFailed(PayoutError::InsufficientFunds { .. })) {
                tracing::error!(%app_id, error = %e, "release blocked by custodial shortfall");
            }
            Err(e.into())
        }
    }
}

/// POST /v1/escrows/{app_id}/lifecycle: Delete or update the application.
#[utoipa::path(
    post,
    path = "/v1/escrows/{app_id}/lifecycle",
    params(("app_id" = u64, Path, description = "Application id")),
    request_body = LifecycleRequest,
    responses(
        (status = 200, description = "Escrow closed", body = LifecycleResponse),
        (status = 403, description = "Rejected action or caller", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already closed", body = crate::error::ErrorBody),
    ),
    tag = "escrows"
)]
pub(crate) async fn apply_lifecycle(
    State(state): State<AppState>,
    Path(app_id): Path<u64>,
    body: Result<Json<LifecycleRequest>, JsonRejection>,
) -> Result<Json<LifecycleResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let app_id = AppId::new(app_id);
    let caller = caller_address(&req.caller)?;

    let status = state
        .escrows
        .try_update(&app_id, |record| record.escrow.lifecycle(&caller, req.action))
        .ok_or_else(|| not_found(app_id))?
        .inspect_err(|e| metrics::record_failure("lifecycle", e.kind()))?;

    metrics::record_operation("lifecycle");
    Ok(Json(LifecycleResponse {
        app_id: app_id.value(),
        status,
    }))
}
