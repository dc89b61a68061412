pub mod auth;

pub use auth::{admin_auth_middleware, customer_auth_middleware, webhook_auth_middleware, AdminCaller, Claims};
