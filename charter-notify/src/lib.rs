pub mod models;
pub mod repository;
pub mod templates;
pub mod dispatcher;

#[cfg(test)]
pub(crate) mod testing;

pub use models::{IdempotencyKey, NewNotification, Notification};
pub use repository::NotificationRepository;
pub use templates::TransitionNotice;
pub use dispatcher::NotificationDispatcher;
