use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use charter_core::{Actor, AdminCapability, Role};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.sub, self.role)
    }
}

fn bearer_claims(state: &AppState, req: &Request) -> Result<Claims, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(token_data.claims)
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

/// Any authenticated caller. Customer routes act on the caller's own records.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = bearer_claims(&state, &req)?;
    req.extensions_mut().insert(claims.actor());
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = bearer_claims(&state, &req)?;
    let actor = claims.actor();

    // Mint the capability here; handlers never see a bare role string
    let cap = actor.admin_capability().ok_or(StatusCode::FORBIDDEN)?;

    tracing::debug!("Admin {} on {}", actor.user_id, req.uri().path());
    req.extensions_mut().insert(actor);
    req.extensions_mut().insert(cap);
    Ok(next.run(req).await)
}

// ============================================================================
// Payment Gateway Webhook
// ============================================================================

/// Checks `X-Webhook-Secret`. Without a configured secret the webhook is closed.
pub async fn webhook_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &state.auth.webhook_secret else {
        tracing::error!("Payment webhook called but auth.webhook_secret is not configured");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    let presented = req
        .headers()
        .get("X-Webhook-Secret")
        .and_then(|h| h.to_str().ok());
    if presented != Some(expected.as_str()) {
        tracing::warn!("Rejected payment webhook with a missing or wrong secret");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

// ============================================================================
// Extractors
// ============================================================================

/// The admin capability minted by `admin_auth_middleware`.
pub struct AdminCaller(pub AdminCapability);

impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminCapability>()
            .cloned()
            .map(AdminCaller)
            .ok_or_else(|| AppError::AuthorizationError("admin role required".to_string()))
    }
}
