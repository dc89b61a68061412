use charter_core::{CoreError, CoreResult, EventBus, Topic};
use charter_shared::models::events::PaymentSettledEvent;
use charter_shared::money::amounts_match;
use charter_shared::{CurrencyCode, Decimal, DomainEvent, PaymentStatus};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::aggregate::{self, Bucket, LedgerSummary, SeriesPoint, TimeWindow};
use crate::models::{NewPayment, Payment};
use crate::repository::PaymentRepository;

/// Append-mostly payment store and the queries the workflow and console need.
pub struct PaymentLedger {
    repo: Arc<dyn PaymentRepository>,
    bus: Arc<dyn EventBus>,
}

impl PaymentLedger {
    pub fn new(repo: Arc<dyn PaymentRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self { repo, bus }
    }

    /// Ingest a gateway record. Records that arrive already terminal are
    /// announced straight away so pending confirmations can re-evaluate.
    pub async fn record(&self, new_payment: NewPayment) -> CoreResult<Payment> {
        new_payment.validate()?;
        let payment = self
            .repo
            .insert_payment(new_payment.into_payment(Utc::now()))
            .await?;

        tracing::info!(
            "Recorded payment {} ({} {} via {}, {})",
            payment.id,
            payment.amount,
            payment.currency,
            payment.method,
            payment.status
        );

        if payment.status.is_terminal() {
            self.announce(&payment).await;
        }
        Ok(payment)
    }

    /// `pending → completed | failed`, exactly once.
    pub async fn settle(
        &self,
        payment_id: Uuid,
        outcome: PaymentStatus,
        transaction_ref: Option<String>,
    ) -> CoreResult<Payment> {
        let payment = self
            .repo
            .settle_payment(payment_id, outcome, transaction_ref, Utc::now())
            .await?;

        tracing::info!("Payment {} settled as {}", payment.id, payment.status);
        self.announce(&payment).await;
        Ok(payment)
    }

    pub async fn get(&self, payment_id: Uuid) -> CoreResult<Payment> {
        self.repo
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("payment {}", payment_id)))
    }

    pub async fn for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        self.repo.payments_for_booking(booking_id).await
    }

    pub async fn for_user(&self, user_id: Uuid) -> CoreResult<Vec<Payment>> {
        self.repo.payments_for_user(user_id).await
    }

    /// Find the completed payment that settles a booking's final price.
    ///
    /// Fails with `PaymentMismatch` describing the closest candidate when no
    /// completed payment in `currency` is within `epsilon` of `amount`.
    pub async fn find_settlement(
        &self,
        booking_id: Uuid,
        amount: Decimal,
        currency: &CurrencyCode,
        epsilon: Decimal,
    ) -> CoreResult<Payment> {
        let payments = self.repo.payments_for_booking(booking_id).await?;
        match_settlement(&payments, booking_id, amount, currency, epsilon)
    }

    pub async fn summary(&self, window: Option<TimeWindow>) -> CoreResult<LedgerSummary> {
        let payments = self.repo.list_payments(window.as_ref()).await?;
        aggregate::summarize(&payments, window)
    }

    pub async fn time_series(
        &self,
        window: TimeWindow,
        bucket: Bucket,
        status: PaymentStatus,
    ) -> CoreResult<Vec<SeriesPoint>> {
        let payments = self.repo.list_payments(Some(&window)).await?;
        aggregate::time_series(&payments, &window, bucket, status)
    }

    async fn announce(&self, payment: &Payment) {
        let Some(booking_id) = payment.booking_id else {
            return;
        };
        let event = DomainEvent::PaymentSettled(PaymentSettledEvent {
            payment_id: payment.id,
            booking_id: Some(booking_id),
            user_id: payment.user_id,
            status: payment.status,
            at: payment.settled_at.unwrap_or_else(Utc::now),
        });
        if let Err(e) = self.bus.publish(Topic::Booking(booking_id), event).await {
            tracing::warn!("Failed to announce settlement of payment {}: {}", payment.id, e);
        }
    }
}

fn match_settlement(
    payments: &[Payment],
    booking_id: Uuid,
    amount: Decimal,
    currency: &CurrencyCode,
    epsilon: Decimal,
) -> CoreResult<Payment> {
    if let Some(found) = payments.iter().find(|p| {
        p.status == PaymentStatus::Completed
            && &p.currency == currency
            && amounts_match(p.amount, amount, epsilon)
    }) {
        return Ok(found.clone());
    }

    let completed: Vec<&Payment> = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .collect();

    let reason = if payments.is_empty() {
        format!("no payment recorded for booking {}", booking_id)
    } else if completed.is_empty() {
        format!(
            "booking {} has {} payment(s) but none completed",
            booking_id,
            payments.len()
        )
    } else if let Some(same_currency) = completed.iter().find(|p| &p.currency == currency) {
        format!(
            "completed payment {} is {} {}, expected {} {}",
            same_currency.id, same_currency.amount, same_currency.currency, amount, currency
        )
    } else {
        format!(
            "completed payment {} is in {}, expected {}",
            completed[0].id, completed[0].currency, currency
        )
    };

    Err(CoreError::PaymentMismatch(reason))
}
