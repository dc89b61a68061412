use std::collections::HashSet;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use charter_core::{Actor, CoreError, Topic};
use charter_notify::Notification;
use charter_shared::NotificationKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::live::sse_from;
use crate::middleware::{admin_auth_middleware, customer_auth_middleware, AdminCaller};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/v1/notifications", get(list_notifications))
        .route("/v1/notifications/read", post(mark_read))
        .route("/v1/notifications/stream", get(stream_notifications))
        .layer(middleware::from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/notifications", post(send_notification))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    customer.merge(admin)
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

/// GET /v1/notifications
async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<NotificationList>, AppError> {
    let notifications = state.notifications.list_for_user(actor.user_id).await?;
    let unread_count = state.notifications.unread_count(actor.user_id).await?;
    Ok(Json(NotificationList {
        notifications,
        unread_count,
    }))
}

/// GET /v1/notifications/stream
async fn stream_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state.bus.subscribe(Topic::Notifications(actor.user_id)).await?;
    Ok(sse_from(subscription))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: usize,
}

/// POST /v1/notifications/read
async fn mark_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, AppError> {
    // Callers may only flip their own notifications
    let owned: HashSet<Uuid> = state
        .notifications
        .list_for_user(actor.user_id)
        .await?
        .into_iter()
        .map(|n| n.id)
        .collect();
    if let Some(foreign) = req.ids.iter().find(|id| !owned.contains(id)) {
        return Err(CoreError::NotFound(format!("notification {}", foreign)).into());
    }

    let marked = state.notifications.mark_read(&req.ids).await?;
    Ok(Json(MarkReadResponse { marked }))
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
}

/// POST /v1/admin/notifications
/// Free-form operator message; never deduplicated.
async fn send_notification(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
    Json(req): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let notification = state
        .notifications
        .dispatch(req.user_id, NotificationKind::General, &req.title, &req.message, None)
        .await?;
    tracing::info!(
        "Admin {} sent notification {} to {}",
        cap.actor_id(),
        notification.id,
        req.user_id
    );
    Ok((StatusCode::CREATED, Json(notification)))
}
