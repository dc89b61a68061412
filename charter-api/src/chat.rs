use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use charter_chat::{ChatMessage, ReadReceipt, ThreadSummary};
use charter_core::Actor;
use charter_shared::SenderRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::live::sse_from;
use crate::middleware::{admin_auth_middleware, customer_auth_middleware, AdminCaller};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/v1/chat/messages", post(send_as_customer).get(my_history))
        .route("/v1/chat/stream", get(my_stream))
        .layer(middleware::from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/chat/threads", get(list_threads))
        .route("/v1/admin/chat/{user_id}/messages", post(send_as_admin).get(thread_history))
        .route("/v1/admin/chat/{user_id}/read", post(mark_thread_read))
        .route("/v1/admin/chat/{user_id}/stream", get(thread_stream))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    customer.merge(admin)
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

// ============================================================================
// Customer side
// ============================================================================

/// POST /v1/chat/messages
async fn send_as_customer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let message = state
        .chat
        .send(actor.user_id, SenderRole::Customer, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /v1/chat/messages
async fn my_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    Ok(Json(state.chat.history(actor.user_id).await?))
}

/// GET /v1/chat/stream
async fn my_stream(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state.chat.subscribe(actor.user_id).await?;
    Ok(sse_from(subscription))
}

// ============================================================================
// Admin side
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ThreadList {
    pub threads: Vec<ThreadSummary>,
    pub total_unread: u64,
}

/// GET /v1/admin/chat/threads
async fn list_threads(State(state): State<AppState>) -> Result<Json<ThreadList>, AppError> {
    let threads = state.chat.list_threads().await?;
    let total_unread = threads.iter().map(|t| u64::from(t.unread_count)).sum();
    Ok(Json(ThreadList {
        threads,
        total_unread,
    }))
}

/// GET /v1/admin/chat/{user_id}/messages
async fn thread_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    Ok(Json(state.chat.history(user_id).await?))
}

/// POST /v1/admin/chat/{user_id}/messages
async fn send_as_admin(
    State(state): State<AppState>,
    AdminCaller(cap): AdminCaller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let message = state
        .chat
        .send(user_id, SenderRole::Admin, &req.content)
        .await?;
    tracing::debug!("Admin {} replied in thread {}", cap.actor_id(), user_id);
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    /// Last message id the admin saw. Later messages stay unread.
    #[serde(default)]
    pub up_to: Option<i64>,
}

/// POST /v1/admin/chat/{user_id}/read
async fn mark_thread_read(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<ReadReceipt>, AppError> {
    let receipt = match req.up_to {
        Some(cutoff) => state.chat.mark_read_up_to(user_id, Some(cutoff)).await?,
        None => state.chat.mark_all_read(user_id).await?,
    };
    Ok(Json(receipt))
}

/// GET /v1/admin/chat/{user_id}/stream
async fn thread_stream(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state.chat.subscribe(user_id).await?;
    Ok(sse_from(subscription))
}
