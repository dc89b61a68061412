use async_trait::async_trait;
use charter_core::CoreResult;
use uuid::Uuid;

use crate::models::{Booking, BookingFilter, BookingUpdate};
use crate::transition::{CommittedTransition, TransitionCommit};

/// Storage port for bookings and their audit log.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_booking(&self, booking: Booking) -> CoreResult<Booking>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Matching bookings, newest first with ids breaking ties.
    async fn list_bookings(&self, filter: &BookingFilter) -> CoreResult<Vec<Booking>>;

    /// Write the new booking row, its audit entry and its notification as one
    /// unit, provided the stored status still equals `commit.expected`.
    ///
    /// Fails with `ConcurrentModification` when the status moved, `NotFound`
    /// when the booking is gone, and `StorageFailure` after a full rollback.
    async fn apply_transition(&self, commit: TransitionCommit) -> CoreResult<CommittedTransition>;

    /// Audit entries in commit order.
    async fn booking_history(&self, booking_id: Uuid) -> CoreResult<Vec<BookingUpdate>>;

    /// Append an audit entry outside a transition. Reconciliation only.
    async fn append_update(&self, update: BookingUpdate) -> CoreResult<BookingUpdate>;
}
