use async_trait::async_trait;
use charter_core::{CoreError, CoreResult};
use charter_shared::PaymentStatus;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::aggregate::TimeWindow;
use crate::models::Payment;
use crate::repository::PaymentRepository;

#[derive(Default)]
pub struct FakePaymentRepository {
    rows: RwLock<Vec<Payment>>,
}

#[async_trait]
impl PaymentRepository for FakePaymentRepository {
    async fn insert_payment(&self, payment: Payment) -> CoreResult<Payment> {
        self.rows.write().await.push(payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.rows.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn settle_payment(
        &self,
        id: Uuid,
        outcome: PaymentStatus,
        transaction_ref: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        let mut rows = self.rows.write().await;
        let payment = rows
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("payment {}", id)))?;
        payment.settle(outcome, transaction_ref, at)?;
        Ok(payment.clone())
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|p| p.booking_id == Some(booking_id)).cloned().collect())
    }

    async fn payments_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Payment>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|p| p.user_id == user_id).cloned().collect())
    }

    async fn list_payments(&self, window: Option<&TimeWindow>) -> CoreResult<Vec<Payment>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|p| window.map_or(true, |w| w.contains(p.created_at)))
            .cloned()
            .collect())
    }
}
