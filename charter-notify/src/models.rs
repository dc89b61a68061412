use charter_shared::NotificationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Deduplication key; one notification per key, ever.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// `"{booking_id}:{kind}"`
    pub fn for_transition(booking_id: Uuid, kind: NotificationKind) -> Self {
        Self(format!("{}:{}", booking_id, kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record surfaced to a customer. Only `read` ever changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub idempotency_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
}

/// Notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl NewNotification {
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            read: false,
            idempotency_key: self.idempotency_key,
            created_at,
        }
    }
}
