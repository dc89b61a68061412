use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use charter_core::Actor;
use charter_ledger::{Bucket, LedgerSummary, NewPayment, Payment, SeriesPoint, TimeWindow};
use charter_shared::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{admin_auth_middleware, customer_auth_middleware, webhook_auth_middleware};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let gateway = Router::new()
        .route("/v1/webhooks/payments", post(handle_payment_webhook))
        .layer(middleware::from_fn_with_state(state.clone(), webhook_auth_middleware));

    let customer = Router::new()
        .route("/v1/payments", get(list_my_payments))
        .layer(middleware::from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/payments/summary", get(payment_summary))
        .route("/v1/admin/payments/{id}", get(get_payment))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    gateway.merge(customer).merge(admin)
}

// ============================================================================
// Gateway ingestion
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentWebhook {
    /// A new payment record, possibly already terminal.
    PaymentRecorded { payment: NewPayment },
    /// Outcome of a payment recorded earlier as pending.
    PaymentSettled {
        payment_id: Uuid,
        status: PaymentStatus,
        #[serde(default)]
        transaction_ref: Option<String>,
    },
}

/// POST /v1/webhooks/payments
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    match payload {
        PaymentWebhook::PaymentRecorded { payment } => {
            tracing::info!(
                "Received payment record for booking {:?} ({})",
                payment.booking_id,
                payment.status
            );
            let stored = state.ledger.record(payment).await?;
            Ok((StatusCode::CREATED, Json(stored)))
        }
        PaymentWebhook::PaymentSettled {
            payment_id,
            status,
            transaction_ref,
        } => {
            tracing::info!("Received settlement {} for payment {}", status, payment_id);
            let settled = state.ledger.settle(payment_id, status, transaction_ref).await?;
            Ok((StatusCode::OK, Json(settled)))
        }
    }
}

// ============================================================================
// Reads
// ============================================================================

/// GET /v1/payments
async fn list_my_payments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(state.ledger.for_user(actor.user_id).await?))
}

/// GET /v1/admin/payments/{id}
async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.ledger.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Adds a time series; needs both `from` and `to`.
    pub bucket: Option<Bucket>,
    /// Status charted by the series, completed by default.
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: LedgerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<SeriesPoint>>,
}

/// GET /v1/admin/payments/summary?from=&to=&bucket=&status=
async fn payment_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let window = match (query.from, query.to) {
        (Some(from), Some(to)) => Some(TimeWindow::new(from, to)?),
        (None, None) => None,
        _ => {
            return Err(AppError::ValidationError(
                "from and to must be given together".to_string(),
            ))
        }
    };

    let series = match (query.bucket, window) {
        (Some(bucket), Some(window)) => {
            let status = query.status.unwrap_or(PaymentStatus::Completed);
            Some(state.ledger.time_series(window, bucket, status).await?)
        }
        (Some(_), None) => {
            return Err(AppError::ValidationError(
                "a time series needs a from/to window".to_string(),
            ))
        }
        (None, _) => None,
    };

    let summary = state.ledger.summary(window).await?;
    Ok(Json(SummaryResponse { summary, series }))
}
