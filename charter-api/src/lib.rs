use axum::{http::Method, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod chat;
pub mod error;
pub mod live;
pub mod middleware;
pub mod notifications;
pub mod payments;
pub mod state;
pub mod worker;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(bookings::routes(state.clone()))
        .merge(payments::routes(state.clone()))
        .merge(notifications::routes(state.clone()))
        .merge(chat::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
