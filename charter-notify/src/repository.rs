use async_trait::async_trait;
use charter_core::CoreResult;
use uuid::Uuid;

use crate::models::{IdempotencyKey, Notification};

/// Storage port for notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert unless a row with the same idempotency key already exists.
    /// Returns the stored row and whether this call created it.
    async fn insert_notification(
        &self,
        notification: Notification,
    ) -> CoreResult<(Notification, bool)>;

    async fn find_notification_by_key(
        &self,
        key: &IdempotencyKey,
    ) -> CoreResult<Option<Notification>>;

    /// Newest first
    async fn list_notifications(&self, user_id: Uuid) -> CoreResult<Vec<Notification>>;

    /// Flip the read flag on every id, or on none of them if any id is unknown.
    async fn mark_notifications_read(&self, ids: &[Uuid]) -> CoreResult<usize>;

    async fn count_unread_notifications(&self, user_id: Uuid) -> CoreResult<usize>;
}
