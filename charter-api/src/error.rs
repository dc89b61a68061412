use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use charter_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    Anyhow(anyhow::Error),
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
        CoreError::InvalidTransition { .. }
        | CoreError::AlreadyTerminal(_)
        | CoreError::ConcurrentModification { .. } => StatusCode::CONFLICT,
        CoreError::PaymentMismatch(_) => StatusCode::PAYMENT_REQUIRED,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CoreError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::Anyhow(err) => match err.downcast_ref::<CoreError>() {
                Some(CoreError::StorageFailure(detail)) => {
                    // Storage details stay in the logs
                    tracing::error!("Storage failure: {}", detail);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "storage_failure",
                        "Storage unavailable, try again".to_string(),
                    )
                }
                Some(core) => (core_status(core), core.kind(), core.to_string()),
                None => {
                    tracing::error!("Internal Server Error: {}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal",
                        "Internal Server Error".to_string(),
                    )
                }
            },
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
