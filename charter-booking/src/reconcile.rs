use charter_core::{CoreResult, SYSTEM_ACTOR};
use charter_notify::{IdempotencyKey, NotificationDispatcher};
use charter_shared::BookingStatus;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::models::{Booking, BookingFilter, BookingUpdate};
use crate::repository::BookingRepository;
use crate::transition::notice_for;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub audit_repaired: usize,
    pub notifications_repaired: usize,
}

/// Finds bookings whose status implies an audit entry or notification that
/// is not stored, and writes the missing record.
pub struct Reconciler {
    bookings: Arc<dyn BookingRepository>,
    notifications: Arc<NotificationDispatcher>,
}

impl Reconciler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        notifications: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            bookings,
            notifications,
        }
    }

    pub async fn run_once(&self) -> CoreResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for booking in self.bookings.list_bookings(&BookingFilter::default()).await? {
            report.scanned += 1;
            if booking.status == BookingStatus::Pending {
                continue;
            }
            let history = self.bookings.booking_history(booking.id).await?;

            for &status in implied_statuses(booking.status) {
                if !history.iter().any(|u| u.status == status) {
                    self.bookings
                        .append_update(BookingUpdate::new(
                            booking.id,
                            status,
                            format!("Reconciled: missing audit entry for {}", status),
                            SYSTEM_ACTOR,
                            Utc::now(),
                        ))
                        .await?;
                    report.audit_repaired += 1;
                    tracing::warn!("Repaired audit entry {} for booking {}", status, booking.id);
                }

                if self.repair_notification(&booking, status).await? {
                    report.notifications_repaired += 1;
                }
            }
        }

        if report.audit_repaired + report.notifications_repaired > 0 {
            tracing::warn!(
                "Reconciliation repaired {} audit entries and {} notifications across {} bookings",
                report.audit_repaired,
                report.notifications_repaired,
                report.scanned
            );
        } else {
            tracing::debug!("Reconciliation clean ({} bookings)", report.scanned);
        }
        Ok(report)
    }

    async fn repair_notification(&self, booking: &Booking, status: BookingStatus) -> CoreResult<bool> {
        // The notice is rendered from the booking as it stood at `status`.
        let mut at_status = booking.clone();
        at_status.status = status;
        let route = booking.route.to_string();
        let Some(notice) = notice_for(&at_status, &route) else {
            tracing::warn!(
                "Booking {} is {} without a final price, cannot rebuild its notice",
                booking.id,
                booking.status
            );
            return Ok(false);
        };

        let key = IdempotencyKey::for_transition(booking.id, notice.kind());
        if self.notifications.exists_for_key(&key).await? {
            return Ok(false);
        }
        let (_, created) = self
            .notifications
            .repair(booking.id, booking.user_id, &notice)
            .await?;
        if created {
            tracing::warn!("Repaired notification {} for booking {}", key, booking.id);
        }
        Ok(created)
    }
}

/// Statuses a booking must have passed through to be at `status`, itself
/// included. A cancellation is only known to have cancelled.
pub fn implied_statuses(status: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;
    match status {
        Pending => &[],
        PriceProposed => &[PriceProposed],
        PaymentPending => &[PriceProposed, PaymentPending],
        Confirmed => &[PriceProposed, PaymentPending, Confirmed],
        Completed => &[PriceProposed, PaymentPending, Confirmed, Completed],
        Cancelled => &[Cancelled],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implied_statuses_end_at_current() {
        for status in [
            BookingStatus::PriceProposed,
            BookingStatus::PaymentPending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(implied_statuses(status).last(), Some(&status));
        }
        assert!(implied_statuses(BookingStatus::Pending).is_empty());
    }
}
