use charter_core::{CoreError, CoreResult};
use charter_notify::{Notification, TransitionNotice};
use charter_shared::{check_amount, BookingStatus, CurrencyCode, Decimal};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Booking, BookingUpdate};

/// An edge of the booking state machine together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    ProposePrice {
        price: Decimal,
        currency: CurrencyCode,
        notes: Option<String>,
    },
    RequestPayment,
    Confirm,
    Cancel {
        reason: String,
    },
    Complete,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::ProposePrice { .. } => "propose_price",
            Transition::RequestPayment => "request_payment",
            Transition::Confirm => "confirm",
            Transition::Cancel { .. } => "cancel",
            Transition::Complete => "complete",
        }
    }

    pub fn target(&self) -> BookingStatus {
        match self {
            Transition::ProposePrice { .. } => BookingStatus::PriceProposed,
            Transition::RequestPayment => BookingStatus::PaymentPending,
            Transition::Confirm => BookingStatus::Confirmed,
            Transition::Cancel { .. } => BookingStatus::Cancelled,
            Transition::Complete => BookingStatus::Completed,
        }
    }

    /// Payload checks that do not depend on stored state.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Transition::ProposePrice { price, .. } => check_amount(*price)
                .map(|_| ())
                .map_err(|e| CoreError::ValidationError(format!("proposed price {}", e))),
            Transition::Cancel { reason } if reason.trim().is_empty() => Err(
                CoreError::ValidationError("cancellation reason is required".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Edge legality from `from`.
    pub fn check(&self, from: BookingStatus) -> CoreResult<()> {
        let allowed = match self {
            Transition::ProposePrice { .. } => from == BookingStatus::Pending,
            Transition::RequestPayment => from == BookingStatus::PriceProposed,
            Transition::Confirm => from == BookingStatus::PaymentPending,
            Transition::Cancel { .. } => !from.is_terminal(),
            Transition::Complete => from == BookingStatus::Confirmed,
        };
        if allowed {
            return Ok(());
        }

        let reports_terminal = match self {
            Transition::Cancel { .. } => from.is_terminal(),
            Transition::Complete => {
                matches!(from, BookingStatus::Completed | BookingStatus::Cancelled)
            }
            _ => false,
        };
        if reports_terminal {
            Err(CoreError::AlreadyTerminal(format!(
                "booking is {}, cannot {}",
                from,
                self.name()
            )))
        } else {
            Err(CoreError::InvalidTransition {
                from: from.to_string(),
                to: self.target().to_string(),
            })
        }
    }

    /// The booking row as it will be after this transition commits.
    pub fn apply(&self, booking: &Booking, at: DateTime<Utc>) -> Booking {
        let mut next = booking.clone();
        next.status = self.target();
        next.updated_at = at;
        match self {
            Transition::ProposePrice {
                price,
                currency,
                notes,
            } => {
                next.final_price = Some(*price);
                next.currency = currency.clone();
                if let Some(notes) = notes {
                    next.admin_notes = Some(notes.trim().to_string());
                }
            }
            Transition::Cancel { reason } => {
                next.cancellation_reason = Some(reason.trim().to_string());
            }
            Transition::RequestPayment | Transition::Confirm | Transition::Complete => {}
        }
        next
    }

    /// Audit text for the committed transition. `settlement` is the payment a
    /// confirmation was matched against.
    pub fn audit_message(&self, booking: &Booking, settlement: Option<Uuid>) -> String {
        match self {
            Transition::ProposePrice { price, currency, notes } => match notes {
                Some(notes) => format!(
                    "Price proposed: {} {} ({} chars of notes)",
                    price.normalize(),
                    currency,
                    notes.chars().count()
                ),
                None => format!("Price proposed: {} {}", price.normalize(), currency),
            },
            Transition::RequestPayment => format!(
                "Payment requested: {} {}",
                booking
                    .final_price
                    .map(|p| p.normalize().to_string())
                    .unwrap_or_default(),
                booking.currency
            ),
            Transition::Confirm => match settlement {
                Some(payment_id) => format!("Booking confirmed against payment {}", payment_id),
                None => "Booking confirmed".to_string(),
            },
            Transition::Cancel { reason } => format!("Booking cancelled: {}", reason.trim()),
            Transition::Complete => "Trip completed".to_string(),
        }
    }
}

/// Customer notice for a booking that has just reached its current status.
/// `None` for `pending`, which no transition targets.
pub fn notice_for<'a>(booking: &'a Booking, route: &'a str) -> Option<TransitionNotice<'a>> {
    match booking.status {
        BookingStatus::Pending => None,
        BookingStatus::PriceProposed => Some(TransitionNotice::PriceProposed {
            route,
            price: booking.final_price?,
            currency: &booking.currency,
        }),
        BookingStatus::PaymentPending => Some(TransitionNotice::PaymentRequested {
            route,
            price: booking.final_price?,
            currency: &booking.currency,
        }),
        BookingStatus::Confirmed => Some(TransitionNotice::Confirmed { route }),
        BookingStatus::Completed => Some(TransitionNotice::Completed { route }),
        BookingStatus::Cancelled => Some(TransitionNotice::Cancelled {
            route,
            reason: booking.cancellation_reason.as_deref().unwrap_or("no reason given"),
        }),
    }
}

/// Everything one transition writes, committed all or nothing.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// Status the booking must still have when the commit is applied.
    pub expected: BookingStatus,
    pub booking: Booking,
    pub update: BookingUpdate,
    /// Carries the `{booking_id}:{kind}` idempotency key.
    pub notification: Notification,
}

#[derive(Debug, Clone)]
pub struct CommittedTransition {
    pub booking: Booking,
    pub update: BookingUpdate,
    pub notification: Notification,
    /// False when a notification with the same idempotency key already existed.
    pub notification_created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingIntake;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::PriceProposed,
        BookingStatus::PaymentPending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    fn eur() -> CurrencyCode {
        CurrencyCode::new("EUR").unwrap()
    }

    fn transitions() -> Vec<Transition> {
        vec![
            Transition::ProposePrice {
                price: dec!(42000),
                currency: eur(),
                notes: None,
            },
            Transition::RequestPayment,
            Transition::Confirm,
            Transition::Cancel {
                reason: "weather".to_string(),
            },
            Transition::Complete,
        ]
    }

    fn booking() -> Booking {
        BookingIntake {
            user_id: Uuid::new_v4(),
            origin: "ZRH".to_string(),
            destination: "JFK".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
            return_date: None,
            passengers: 4,
            aircraft_type: "Global 7500".to_string(),
            currency: eur(),
        }
        .into_booking(Utc::now())
    }

    #[test]
    fn test_allowed_edges() {
        let mut allowed = Vec::new();
        for from in ALL {
            for t in transitions() {
                if t.check(from).is_ok() {
                    allowed.push((from, t.target()));
                }
            }
        }

        assert_eq!(
            allowed,
            vec![
                (BookingStatus::Pending, BookingStatus::PriceProposed),
                (BookingStatus::Pending, BookingStatus::Cancelled),
                (BookingStatus::PriceProposed, BookingStatus::PaymentPending),
                (BookingStatus::PriceProposed, BookingStatus::Cancelled),
                (BookingStatus::PaymentPending, BookingStatus::Confirmed),
                (BookingStatus::PaymentPending, BookingStatus::Cancelled),
                (BookingStatus::Confirmed, BookingStatus::Completed),
            ]
        );
    }

    #[test]
    fn test_rejection_kinds() {
        let cancel = Transition::Cancel {
            reason: "weather".to_string(),
        };
        for from in [
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert!(matches!(cancel.check(from), Err(CoreError::AlreadyTerminal(_))));
        }

        assert!(matches!(
            Transition::Complete.check(BookingStatus::Cancelled),
            Err(CoreError::AlreadyTerminal(_))
        ));
        assert!(matches!(
            Transition::Complete.check(BookingStatus::PaymentPending),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            Transition::Confirm.check(BookingStatus::PriceProposed),
            Err(CoreError::InvalidTransition { ref from, ref to })
                if from == "price_proposed" && to == "confirmed"
        ));
    }

    #[test]
    fn test_payload_validation() {
        let free = Transition::ProposePrice {
            price: dec!(0),
            currency: eur(),
            notes: None,
        };
        assert!(matches!(free.validate(), Err(CoreError::ValidationError(_))));

        let over_scaled = Transition::ProposePrice {
            price: dec!(100.004),
            currency: eur(),
            notes: None,
        };
        assert!(matches!(over_scaled.validate(), Err(CoreError::ValidationError(_))));

        let huge = Transition::ProposePrice {
            price: dec!(1000000000000),
            currency: eur(),
            notes: None,
        };
        assert!(matches!(huge.validate(), Err(CoreError::ValidationError(_))));

        let exact = Transition::ProposePrice {
            price: dec!(42000.50),
            currency: eur(),
            notes: None,
        };
        assert!(exact.validate().is_ok());

        let silent = Transition::Cancel {
            reason: "  ".to_string(),
        };
        assert!(silent.validate().is_err());
    }

    #[test]
    fn test_apply_price_proposal() {
        let before = booking();
        let t = Transition::ProposePrice {
            price: dec!(42000),
            currency: CurrencyCode::new("CHF").unwrap(),
            notes: Some(" includes catering ".to_string()),
        };

        let after = t.apply(&before, Utc::now());
        assert_eq!(after.status, BookingStatus::PriceProposed);
        assert_eq!(after.final_price, Some(dec!(42000)));
        assert_eq!(after.currency.as_str(), "CHF");
        assert_eq!(after.admin_notes.as_deref(), Some("includes catering"));
        assert_eq!(before.status, BookingStatus::Pending);

        let message = t.audit_message(&after, None);
        assert!(message.contains("42000 CHF"));
        assert!(!message.contains("catering"));
    }

    #[test]
    fn test_notice_follows_status() {
        let mut b = booking();
        let route = b.route.to_string();
        assert!(notice_for(&b, &route).is_none());

        b.status = BookingStatus::PriceProposed;
        // A proposal without a price has nothing to announce.
        assert!(notice_for(&b, &route).is_none());

        b.final_price = Some(dec!(42000));
        let notice = notice_for(&b, &route).unwrap();
        assert!(notice.message().contains("42000"));
        assert!(notice.message().contains("EUR"));
    }
}
