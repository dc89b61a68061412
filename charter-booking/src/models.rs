use charter_core::{CoreError, CoreResult};
use charter_shared::{BookingStatus, CurrencyCode, Decimal};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Certified seating of the largest airliner in service.
pub const MAX_PASSENGERS: u32 = 853;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.origin, self.destination)
    }
}

/// A customer's charter request and where it stands in the lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: BookingStatus,
    pub route: Route,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passengers: u32,
    pub aircraft_type: String,
    /// Agreed price. Set by the price proposal and matched against payments
    /// on confirmation.
    pub final_price: Option<Decimal>,
    pub currency: CurrencyCode,
    pub admin_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Intake form submitted by a customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingIntake {
    pub user_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub passengers: u32,
    pub aircraft_type: String,
    pub currency: CurrencyCode,
}

impl BookingIntake {
    pub fn validate(&self) -> CoreResult<()> {
        let origin = self.origin.trim();
        let destination = self.destination.trim();

        if origin.is_empty() || destination.is_empty() {
            return Err(CoreError::ValidationError(
                "origin and destination are required".to_string(),
            ));
        }
        if origin.eq_ignore_ascii_case(destination) {
            return Err(CoreError::ValidationError(format!(
                "origin and destination are both {}",
                origin
            )));
        }
        if self.passengers == 0 {
            return Err(CoreError::ValidationError(
                "at least one passenger is required".to_string(),
            ));
        }
        if self.passengers > MAX_PASSENGERS {
            return Err(CoreError::ValidationError(format!(
                "{} passengers exceeds the limit of {}",
                self.passengers, MAX_PASSENGERS
            )));
        }
        if self.aircraft_type.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "aircraft type is required".to_string(),
            ));
        }
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(CoreError::ValidationError(format!(
                    "return date {} is before departure {}",
                    return_date, self.departure_date
                )));
            }
        }
        Ok(())
    }

    pub fn into_booking(self, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            status: BookingStatus::Pending,
            route: Route {
                origin: self.origin.trim().to_uppercase(),
                destination: self.destination.trim().to_uppercase(),
            },
            departure_date: self.departure_date,
            return_date: self.return_date,
            passengers: self.passengers,
            aircraft_type: self.aircraft_type.trim().to_string(),
            final_price: None,
            currency: self.currency,
            admin_notes: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Audit entry; exactly one per committed status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingUpdate {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub message: String,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl BookingUpdate {
    pub fn new(
        booking_id: Uuid,
        status: BookingStatus,
        message: impl Into<String>,
        actor_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            status,
            message: message.into(),
            actor_id,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub user_id: Option<Uuid>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.status.map_or(true, |s| booking.status == s)
            && self.user_id.map_or(true, |u| booking.user_id == u)
    }
}

/// Newest first; ids break ties so equal timestamps list deterministically.
pub fn listing_order(a: &Booking, b: &Booking) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
