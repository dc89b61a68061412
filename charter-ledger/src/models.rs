use charter_core::{CoreError, CoreResult};
use charter_shared::{check_amount, CurrencyCode, Decimal, PaymentMethod, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monetary transaction reported by the payment gateway.
///
/// Frozen once `status` is `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// `pending → completed | failed`; anything else is rejected.
    pub fn settle(
        &mut self,
        outcome: PaymentStatus,
        transaction_ref: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::AlreadyTerminal(format!(
                "payment {} is already {}",
                self.id, self.status
            )));
        }
        if !outcome.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: outcome.to_string(),
            });
        }

        self.status = outcome;
        if transaction_ref.is_some() {
            self.transaction_ref = transaction_ref;
        }
        self.settled_at = Some(at);
        Ok(())
    }
}

/// Gateway output as ingested by the reconciliation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_ref: Option<String>,
    /// Gateway timestamp; defaults to ingestion time.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewPayment {
    pub fn validate(&self) -> CoreResult<()> {
        check_amount(self.amount)
            .map_err(|e| CoreError::ValidationError(format!("payment {}", e)))?;
        if let Some(reference) = &self.transaction_ref {
            if reference.trim().is_empty() {
                return Err(CoreError::ValidationError(
                    "transaction reference must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn into_payment(self, now: DateTime<Utc>) -> Payment {
        let created_at = self.created_at.unwrap_or(now);
        Payment {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            booking_id: self.booking_id,
            amount: self.amount,
            currency: self.currency,
            method: self.method,
            settled_at: self.status.is_terminal().then_some(created_at),
            status: self.status,
            transaction_ref: self.transaction_ref,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending_payment() -> Payment {
        NewPayment {
            user_id: Uuid::new_v4(),
            booking_id: None,
            amount: dec!(42000),
            currency: CurrencyCode::new("EUR").unwrap(),
            method: PaymentMethod::Bank,
            status: PaymentStatus::Pending,
            transaction_ref: None,
            created_at: None,
        }
        .into_payment(Utc::now())
    }

    #[test]
    fn test_settle_pending_payment() {
        let mut payment = pending_payment();
        payment
            .settle(PaymentStatus::Completed, Some("wire-991".to_string()), Utc::now())
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.transaction_ref.as_deref(), Some("wire-991"));
        assert!(payment.settled_at.is_some());
    }

    #[test]
    fn test_terminal_payment_is_frozen() {
        let mut payment = pending_payment();
        payment.settle(PaymentStatus::Failed, None, Utc::now()).unwrap();
        let frozen = payment.clone();

        let result = payment.settle(PaymentStatus::Completed, None, Utc::now());
        assert!(matches!(result, Err(CoreError::AlreadyTerminal(_))));
        assert_eq!(payment, frozen);
    }

    #[test]
    fn test_settle_to_pending_is_invalid() {
        let mut payment = pending_payment();
        let result = payment.settle(PaymentStatus::Pending, None, Utc::now());
        assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let payment = NewPayment {
            user_id: Uuid::new_v4(),
            booking_id: None,
            amount: dec!(0),
            currency: CurrencyCode::new("USD").unwrap(),
            method: PaymentMethod::Card,
            status: PaymentStatus::Pending,
            transaction_ref: None,
            created_at: None,
        };
        assert!(matches!(payment.validate(), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_amount_must_fit_money_column() {
        let base = NewPayment {
            user_id: Uuid::new_v4(),
            booking_id: None,
            amount: dec!(100.00),
            currency: CurrencyCode::new("USD").unwrap(),
            method: PaymentMethod::Card,
            status: PaymentStatus::Completed,
            transaction_ref: None,
            created_at: None,
        };
        assert!(base.validate().is_ok());

        let over_scaled = NewPayment { amount: dec!(100.001), ..base.clone() };
        assert!(matches!(over_scaled.validate(), Err(CoreError::ValidationError(_))));

        let huge = NewPayment { amount: Decimal::MAX, ..base };
        assert!(matches!(huge.validate(), Err(CoreError::ValidationError(_))));
    }
}
