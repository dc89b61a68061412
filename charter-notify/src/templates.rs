use charter_shared::{CurrencyCode, Decimal, NotificationKind};

/// Customer-facing wording for each booking transition.
#[derive(Debug, Clone)]
pub enum TransitionNotice<'a> {
    PriceProposed {
        route: &'a str,
        price: Decimal,
        currency: &'a CurrencyCode,
    },
    PaymentRequested {
        route: &'a str,
        price: Decimal,
        currency: &'a CurrencyCode,
    },
    Confirmed {
        route: &'a str,
    },
    Cancelled {
        route: &'a str,
        reason: &'a str,
    },
    Completed {
        route: &'a str,
    },
}

impl TransitionNotice<'_> {
    pub fn kind(&self) -> NotificationKind {
        match self {
            TransitionNotice::PriceProposed { .. } => NotificationKind::PriceProposed,
            TransitionNotice::PaymentRequested { .. } => NotificationKind::PaymentRequested,
            TransitionNotice::Confirmed { .. } => NotificationKind::BookingConfirmed,
            TransitionNotice::Cancelled { .. } => NotificationKind::BookingCancelled,
            TransitionNotice::Completed { .. } => NotificationKind::BookingCompleted,
        }
    }

    pub fn title(&self) -> String {
        match self {
            TransitionNotice::PriceProposed { .. } => "Price proposal received".to_string(),
            TransitionNotice::PaymentRequested { .. } => "Payment requested".to_string(),
            TransitionNotice::Confirmed { .. } => "Booking confirmed".to_string(),
            TransitionNotice::Cancelled { .. } => "Booking cancelled".to_string(),
            TransitionNotice::Completed { .. } => "Trip completed".to_string(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            TransitionNotice::PriceProposed { route, price, currency } => format!(
                "We have proposed a price of {} {} for your charter {}. Please review it in your bookings.",
                price.normalize(),
                currency,
                route
            ),
            TransitionNotice::PaymentRequested { route, price, currency } => format!(
                "Your charter {} is ready for payment of {} {}.",
                route,
                price.normalize(),
                currency
            ),
            TransitionNotice::Confirmed { route } => {
                format!("Your charter {} is confirmed. Have a pleasant flight.", route)
            }
            TransitionNotice::Cancelled { route, reason } => {
                format!("Your charter {} has been cancelled: {}", route, reason)
            }
            TransitionNotice::Completed { route } => {
                format!("Thank you for flying with us on {}.", route)
            }
        }
    }
}
