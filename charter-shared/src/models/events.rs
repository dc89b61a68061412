use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{BookingStatus, NotificationKind, PaymentStatus, SenderRole};

/// Published after a booking transition has committed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingTransitionedEvent {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
}

/// Published when a payment reaches a terminal status, either on ingest or on settlement.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentSettledEvent {
    pub payment_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub user_id: Uuid,
    pub status: PaymentStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NotificationCreatedEvent {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessagePostedEvent {
    pub message_id: i64,
    pub user_id: Uuid,
    pub sender: SenderRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingTransitioned(BookingTransitionedEvent),
    PaymentSettled(PaymentSettledEvent),
    NotificationCreated(NotificationCreatedEvent),
    ChatMessagePosted(ChatMessagePostedEvent),
}

impl DomainEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::BookingTransitioned(_) => "booking_transitioned",
            DomainEvent::PaymentSettled(_) => "payment_settled",
            DomainEvent::NotificationCreated(_) => "notification_created",
            DomainEvent::ChatMessagePosted(_) => "chat_message",
        }
    }
}
