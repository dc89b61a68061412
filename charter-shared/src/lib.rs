pub mod models;
pub mod money;
pub mod pii;

pub use models::events::DomainEvent;
pub use models::status::{
    BookingStatus, NotificationKind, PaymentMethod, PaymentStatus, SenderRole, UnknownVariant,
};
pub use money::{check_amount, max_amount, CurrencyCode, Decimal, InvalidAmount, MONEY_SCALE};
pub use pii::Masked;
