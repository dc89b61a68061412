pub mod models;
pub mod repository;
pub mod aggregate;
pub mod ledger;

#[cfg(test)]
pub(crate) mod testing;

pub use models::{NewPayment, Payment};
pub use repository::PaymentRepository;
pub use aggregate::{Bucket, LedgerSummary, SeriesPoint, TimeWindow, Total};
pub use ledger::PaymentLedger;
