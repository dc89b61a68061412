use async_trait::async_trait;
use charter_core::{CoreError, CoreResult};
use charter_ledger::{Payment, PaymentRepository, TimeWindow};
use charter_shared::{CurrencyCode, Decimal, PaymentStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::storage_err;

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAYMENT_COLUMNS: &str =
    "id, user_id, booking_id, amount, currency, method, status, transaction_ref, created_at, settled_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    booking_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    method: String,
    status: String,
    transaction_ref: Option<String>,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> CoreResult<Self> {
        Ok(Payment {
            id: row.id,
            user_id: row.user_id,
            booking_id: row.booking_id,
            amount: row.amount,
            currency: CurrencyCode::new(row.currency.trim())?,
            method: row.method.parse()?,
            status: row.status.parse()?,
            transaction_ref: row.transaction_ref,
            created_at: row.created_at,
            settled_at: row.settled_at,
        })
    }
}

impl StorePaymentRepository {
    async fn fetch_where(&self, clause: &str, id: Uuid) -> CoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE {} = $1 ORDER BY created_at, id",
            PAYMENT_COLUMNS, clause
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn insert_payment(&self, payment: Payment) -> CoreResult<Payment> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, user_id, booking_id, amount, currency, method, status,
                                  transaction_ref, created_at, settled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(payment.currency.as_str())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.transaction_ref)
        .bind(payment.created_at)
        .bind(payment.settled_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(payment)
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.fetch_where("id", id).await?.into_iter().next())
    }

    async fn settle_payment(
        &self,
        id: Uuid,
        outcome: PaymentStatus,
        transaction_ref: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| CoreError::NotFound(format!("payment {}", id)))?;

        let mut payment = Payment::try_from(row)?;
        payment.settle(outcome, transaction_ref, at)?;

        sqlx::query(
            "UPDATE payments SET status = $1, transaction_ref = $2, settled_at = $3 WHERE id = $4",
        )
        .bind(payment.status.as_str())
        .bind(&payment.transaction_ref)
        .bind(payment.settled_at)
        .bind(payment.id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(payment)
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        self.fetch_where("booking_id", booking_id).await
    }

    async fn payments_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Payment>> {
        self.fetch_where("user_id", user_id).await
    }

    async fn list_payments(&self, window: Option<&TimeWindow>) -> CoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {} FROM payments
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2)
            ORDER BY created_at, id
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(window.map(|w| w.from))
        .bind(window.map(|w| w.to))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}
