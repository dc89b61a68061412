use async_trait::async_trait;
use charter_core::{CoreError, CoreResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{IdempotencyKey, Notification};
use crate::repository::NotificationRepository;

#[derive(Default)]
pub struct FakeNotificationRepository {
    rows: RwLock<Vec<Notification>>,
}

#[async_trait]
impl NotificationRepository for FakeNotificationRepository {
    async fn insert_notification(
        &self,
        notification: Notification,
    ) -> CoreResult<(Notification, bool)> {
        let mut rows = self.rows.write().await;
        if let Some(key) = &notification.idempotency_key {
            if let Some(existing) = rows.iter().find(|n| n.idempotency_key.as_ref() == Some(key)) {
                return Ok((existing.clone(), false));
            }
        }
        rows.push(notification.clone());
        Ok((notification, true))
    }

    async fn find_notification_by_key(
        &self,
        key: &IdempotencyKey,
    ) -> CoreResult<Option<Notification>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|n| n.idempotency_key.as_ref() == Some(key))
            .cloned())
    }

    async fn list_notifications(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let rows = self.rows.read().await;
        let mut found: Vec<_> = rows.iter().filter(|n| n.user_id == user_id).cloned().collect();
        found.reverse();
        Ok(found)
    }

    async fn mark_notifications_read(&self, ids: &[Uuid]) -> CoreResult<usize> {
        let mut rows = self.rows.write().await;
        let positions: HashMap<Uuid, usize> =
            rows.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        if let Some(missing) = ids.iter().find(|id| !positions.contains_key(id)) {
            return Err(CoreError::NotFound(format!("notification {}", missing)));
        }
        for id in ids {
            rows[positions[id]].read = true;
        }
        Ok(ids.len())
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> CoreResult<usize> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|n| n.user_id == user_id && !n.read).count())
    }
}
