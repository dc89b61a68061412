use charter_core::{CoreError, CoreResult, EventBus, Topic};
use charter_shared::models::events::NotificationCreatedEvent;
use charter_shared::{DomainEvent, NotificationKind};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{IdempotencyKey, NewNotification, Notification};
use crate::repository::NotificationRepository;
use crate::templates::TransitionNotice;

/// Creates user-facing notifications and announces them on the user's topic.
pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
    bus: Arc<dyn EventBus>,
}

impl NotificationDispatcher {
    pub fn new(repo: Arc<dyn NotificationRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self { repo, bus }
    }

    /// Create a notification. With a key, a repeated call returns the
    /// originally stored record instead of creating a second one.
    pub async fn dispatch(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        idempotency_key: Option<IdempotencyKey>,
    ) -> CoreResult<Notification> {
        if title.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "notification title must not be empty".to_string(),
            ));
        }

        let draft = NewNotification {
            user_id,
            kind,
            title: title.trim().to_string(),
            message: message.to_string(),
            idempotency_key,
        };

        let (stored, created) = self
            .repo
            .insert_notification(draft.into_notification(Utc::now()))
            .await?;

        if created {
            self.announce(&stored).await;
        } else {
            tracing::info!(
                "Notification for key {:?} already exists ({}), not duplicating",
                stored.idempotency_key,
                stored.id
            );
        }

        Ok(stored)
    }

    /// Build the notification a booking transition commits alongside its
    /// status change. Nothing is written here.
    pub fn compose_for_transition(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
        notice: &TransitionNotice<'_>,
    ) -> NewNotification {
        compose(booking_id, user_id, notice)
    }

    /// Publish a committed notification to live subscribers. Delivery is
    /// fire-and-forget; the stored row is the source of truth.
    pub async fn announce(&self, notification: &Notification) {
        let event = DomainEvent::NotificationCreated(NotificationCreatedEvent {
            notification_id: notification.id,
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title.clone(),
            at: notification.created_at,
        });

        if let Err(e) = self
            .bus
            .publish(Topic::Notifications(notification.user_id), event)
            .await
        {
            tracing::warn!("Failed to announce notification {}: {}", notification.id, e);
        }
    }

    /// Flip the read flag on all ids in one unit.
    pub async fn mark_read(&self, ids: &[Uuid]) -> CoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let flipped = self.repo.mark_notifications_read(ids).await?;
        tracing::debug!("Marked {} notification(s) read", flipped);
        Ok(flipped)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        self.repo.list_notifications(user_id).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> CoreResult<usize> {
        self.repo.count_unread_notifications(user_id).await
    }

    pub async fn exists_for_key(&self, key: &IdempotencyKey) -> CoreResult<bool> {
        Ok(self.repo.find_notification_by_key(key).await?.is_some())
    }

    /// Insert a transition notification outside of a transition commit.
    /// Used by reconciliation to repair a missing record.
    pub async fn repair(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
        notice: &TransitionNotice<'_>,
    ) -> CoreResult<(Notification, bool)> {
        let draft = compose(booking_id, user_id, notice);
        let (stored, created) = self
            .repo
            .insert_notification(draft.into_notification(Utc::now()))
            .await?;
        if created {
            self.announce(&stored).await;
        }
        Ok((stored, created))
    }
}

fn compose(booking_id: Uuid, user_id: Uuid, notice: &TransitionNotice<'_>) -> NewNotification {
    let kind = notice.kind();
    NewNotification {
        user_id,
        kind,
        title: notice.title(),
        message: notice.message(),
        idempotency_key: Some(IdempotencyKey::for_transition(booking_id, kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNotificationRepository;
    use charter_core::InProcessBus;
    use charter_shared::CurrencyCode;
    use rust_decimal_macros::dec;

    fn dispatcher() -> (NotificationDispatcher, Arc<InProcessBus>) {
        let bus = Arc::new(InProcessBus::new());
        let repo = Arc::new(FakeNotificationRepository::default());
        (NotificationDispatcher::new(repo, bus.clone()), bus)
    }

    #[tokio::test]
    async fn test_dispatch_is_idempotent_per_key() {
        let (dispatcher, _bus) = dispatcher();
        let user_id = Uuid::new_v4();
        let key = IdempotencyKey::new("booking-1:price_proposed");

        let first = dispatcher
            .dispatch(user_id, NotificationKind::PriceProposed, "Price", "42000 EUR", Some(key.clone()))
            .await
            .unwrap();
        let second = dispatcher
            .dispatch(user_id, NotificationKind::PriceProposed, "Price", "42000 EUR", Some(key))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(dispatcher.list_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_without_key_always_creates() {
        let (dispatcher, _bus) = dispatcher();
        let user_id = Uuid::new_v4();

        for _ in 0..2 {
            dispatcher
                .dispatch(user_id, NotificationKind::General, "Hello", "Welcome aboard", None)
                .await
                .unwrap();
        }

        assert_eq!(dispatcher.unread_count(user_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected() {
        let (dispatcher, _bus) = dispatcher();
        let result = dispatcher
            .dispatch(Uuid::new_v4(), NotificationKind::General, "  ", "body", None)
            .await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_mark_read_is_all_or_nothing() {
        let (dispatcher, _bus) = dispatcher();
        let user_id = Uuid::new_v4();
        let n = dispatcher
            .dispatch(user_id, NotificationKind::General, "Hello", "body", None)
            .await
            .unwrap();

        let result = dispatcher.mark_read(&[n.id, Uuid::new_v4()]).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
        assert_eq!(dispatcher.unread_count(user_id).await.unwrap(), 1);

        assert_eq!(dispatcher.mark_read(&[n.id]).await.unwrap(), 1);
        assert_eq!(dispatcher.unread_count(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_created_notifications_are_announced() {
        let (dispatcher, bus) = dispatcher();
        let user_id = Uuid::new_v4();
        let mut sub = bus.subscribe(Topic::Notifications(user_id)).await.unwrap();

        let stored = dispatcher
            .dispatch(user_id, NotificationKind::General, "Hello", "body", None)
            .await
            .unwrap();

        match sub.next().await.unwrap() {
            DomainEvent::NotificationCreated(e) => assert_eq!(e.notification_id, stored.id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repair_does_not_duplicate_transition_notice() {
        let (dispatcher, _bus) = dispatcher();
        let booking_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let eur = CurrencyCode::new("EUR").unwrap();
        let notice = TransitionNotice::PriceProposed {
            route: "ZRH → JFK",
            price: dec!(42000),
            currency: &eur,
        };

        let (_, created) = dispatcher.repair(booking_id, user_id, &notice).await.unwrap();
        assert!(created);
        let (_, created_again) = dispatcher.repair(booking_id, user_id, &notice).await.unwrap();
        assert!(!created_again);

        let key = IdempotencyKey::for_transition(booking_id, NotificationKind::PriceProposed);
        assert!(dispatcher.exists_for_key(&key).await.unwrap());
    }
}
