use async_trait::async_trait;
use charter_core::CoreResult;
use charter_shared::PaymentStatus;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::TimeWindow;
use crate::models::Payment;

/// Storage port for payments.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert_payment(&self, payment: Payment) -> CoreResult<Payment>;

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>>;

    /// Atomically apply `Payment::settle` to the stored row.
    async fn settle_payment(
        &self,
        id: Uuid,
        outcome: PaymentStatus,
        transaction_ref: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Payment>;

    async fn payments_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>>;

    async fn payments_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Payment>>;

    /// All payments created inside the window, or every payment for `None`.
    async fn list_payments(&self, window: Option<&TimeWindow>) -> CoreResult<Vec<Payment>>;
}
