use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// Wire/storage names match the serde `snake_case` representation.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    PriceProposed,
    PaymentPending,
    Confirmed,
    Completed,
    Cancelled,
}

string_enum!(BookingStatus, "booking status", {
    Pending => "pending",
    PriceProposed => "price_proposed",
    PaymentPending => "payment_pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// Confirmed counts as terminal for cancellation even though it can still complete.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Crypto,
    Bank,
}

string_enum!(PaymentMethod, "payment method", {
    Card => "card",
    Crypto => "crypto",
    Bank => "bank",
});

/// Author of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Customer,
    Admin,
    System,
}

string_enum!(SenderRole, "sender role", {
    Customer => "customer",
    Admin => "admin",
    System => "system",
});

impl SenderRole {
    /// Messages that count toward the admin-facing unread total.
    pub fn counts_as_unread(&self) -> bool {
        !matches!(self, Self::Admin)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PriceProposed,
    PaymentRequested,
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    General,
}

string_enum!(NotificationKind, "notification kind", {
    PriceProposed => "price_proposed",
    PaymentRequested => "payment_requested",
    BookingConfirmed => "booking_confirmed",
    BookingCancelled => "booking_cancelled",
    BookingCompleted => "booking_completed",
    General => "general",
});
