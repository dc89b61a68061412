use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use charter_booking::{
    Booking, BookingFilter, BookingIntake, BookingUpdate, ReconcileReport, Transition,
};
use charter_core::{Actor, AdminCapability};
use charter_ledger::Payment;
use charter_shared::{BookingStatus, CurrencyCode, Decimal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{admin_auth_middleware, customer_auth_middleware, AdminCaller};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_my_booking))
        .layer(middleware::from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/bookings/{id}", get(get_booking))
        .route("/v1/admin/bookings/{id}/price-proposal", post(propose_price))
        .route("/v1/admin/bookings/{id}/payment-pending", post(request_payment))
        .route("/v1/admin/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/admin/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/admin/bookings/{id}/complete", post(complete_booking))
        .route("/v1/admin/reconcile", post(reconcile))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    customer.merge(admin)
}

// ============================================================================
// Customer intake
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub passengers: u32,
    pub aircraft_type: String,
    pub currency: CurrencyCode,
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .workflow
        .create(BookingIntake {
            user_id: actor.user_id,
            origin: req.origin,
            destination: req.destination,
            departure_date: req.departure_date,
            return_date: req.return_date,
            passengers: req.passengers,
            aircraft_type: req.aircraft_type,
            currency: req.currency,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings
async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let filter = BookingFilter {
        status: None,
        user_id: Some(actor.user_id),
    };
    Ok(Json(state.workflow.list(&filter).await?))
}

/// GET /v1/bookings/{id}
async fn get_my_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.workflow.get(id).await?;
    // Someone else's booking looks exactly like a missing one
    if booking.user_id != actor.user_id {
        return Err(charter_core::CoreError::NotFound(format!("booking {}", id)).into());
    }
    Ok(Json(booking))
}

// ============================================================================
// Admin console
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<BookingStatus>,
    pub user_id: Option<Uuid>,
}

/// GET /v1/admin/bookings?status=&user_id=
async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let filter = BookingFilter {
        status: query.status,
        user_id: query.user_id,
    };
    Ok(Json(state.workflow.list(&filter).await?))
}

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub history: Vec<BookingUpdate>,
    pub payments: Vec<Payment>,
}

/// GET /v1/admin/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetail>, AppError> {
    let booking = state.workflow.get(id).await?;
    let history = state.workflow.history(id).await?;
    let payments = state.ledger.for_booking(id).await?;
    Ok(Json(BookingDetail {
        booking,
        history,
        payments,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// Status the operator saw when they chose this action.
    pub observed_status: BookingStatus,
    /// Refetch and retry on conflict or storage fault.
    #[serde(default)]
    pub retry: bool,
}

#[derive(Debug, Deserialize)]
pub struct PriceProposalRequest {
    pub observed_status: BookingStatus,
    pub final_price: Decimal,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub retry: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub observed_status: BookingStatus,
    /// Hold the request open until a matching payment settles.
    #[serde(default)]
    pub wait_for_settlement: bool,
    #[serde(default)]
    pub retry: bool,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub observed_status: BookingStatus,
    pub reason: String,
    #[serde(default)]
    pub retry: bool,
}

async fn retried(
    state: &AppState,
    cap: &AdminCapability,
    id: Uuid,
    observed: BookingStatus,
    transition: Transition,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(
        state
            .workflow
            .execute_with_retry(cap, id, observed, transition)
            .await?,
    ))
}

/// POST /v1/admin/bookings/{id}/price-proposal
async fn propose_price(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<PriceProposalRequest>,
) -> Result<Json<Booking>, AppError> {
    if req.retry {
        let transition = Transition::ProposePrice {
            price: req.final_price,
            currency: req.currency,
            notes: req.notes,
        };
        return retried(&state, &cap, id, req.observed_status, transition).await;
    }
    let booking = state
        .workflow
        .submit_price_proposal(&cap, id, req.observed_status, req.final_price, req.currency, req.notes)
        .await?;
    Ok(Json(booking))
}

/// POST /v1/admin/bookings/{id}/payment-pending
async fn request_payment(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Booking>, AppError> {
    if req.retry {
        return retried(&state, &cap, id, req.observed_status, Transition::RequestPayment).await;
    }
    let booking = state
        .workflow
        .advance_to_payment_pending(&cap, id, req.observed_status)
        .await?;
    Ok(Json(booking))
}

/// POST /v1/admin/bookings/{id}/confirm
async fn confirm_booking(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Booking>, AppError> {
    if req.wait_for_settlement {
        let booking = state
            .workflow
            .confirm_when_settled(&cap, id, req.observed_status)
            .await?;
        return Ok(Json(booking));
    }
    if req.retry {
        return retried(&state, &cap, id, req.observed_status, Transition::Confirm).await;
    }
    Ok(Json(state.workflow.confirm(&cap, id, req.observed_status).await?))
}

/// POST /v1/admin/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    if req.retry {
        let transition = Transition::Cancel { reason: req.reason };
        return retried(&state, &cap, id, req.observed_status, transition).await;
    }
    let booking = state
        .workflow
        .cancel(&cap, id, req.observed_status, &req.reason)
        .await?;
    Ok(Json(booking))
}

/// POST /v1/admin/bookings/{id}/complete
async fn complete_booking(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Booking>, AppError> {
    if req.retry {
        return retried(&state, &cap, id, req.observed_status, Transition::Complete).await;
    }
    Ok(Json(state.workflow.complete(&cap, id, req.observed_status).await?))
}

/// POST /v1/admin/reconcile
/// On-demand repair pass, same as the background worker's.
async fn reconcile(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
) -> Result<Json<ReconcileReport>, AppError> {
    let report = state.reconciler.run_once().await?;
    tracing::info!("Admin {} ran reconciliation: {:?}", cap.actor_id(), report);
    Ok(Json(report))
}
