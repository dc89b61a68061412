use charter_core::{AdminCapability, CoreError, CoreResult, EventBus, RetryPolicy, Topic};
use charter_ledger::{Payment, PaymentLedger};
use charter_notify::NotificationDispatcher;
use charter_shared::models::events::BookingTransitionedEvent;
use charter_shared::{BookingStatus, CurrencyCode, Decimal, DomainEvent, Masked, PaymentStatus};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{listing_order, Booking, BookingFilter, BookingIntake, BookingUpdate};
use crate::repository::BookingRepository;
use crate::transition::{notice_for, Transition, TransitionCommit};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowSettings {
    /// Allowed difference between final price and payment amount.
    pub amount_epsilon: Decimal,
    pub settlement_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            amount_epsilon: Decimal::ZERO,
            settlement_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Booking state machine. Every mutation commits the booking row, its audit
/// entry and the customer notification together.
pub struct BookingWorkflow {
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<PaymentLedger>,
    notifications: Arc<NotificationDispatcher>,
    bus: Arc<dyn EventBus>,
    settings: WorkflowSettings,
}

impl BookingWorkflow {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        ledger: Arc<PaymentLedger>,
        notifications: Arc<NotificationDispatcher>,
        bus: Arc<dyn EventBus>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            bookings,
            ledger,
            notifications,
            bus,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Register a customer request as a `pending` booking.
    pub async fn create(&self, intake: BookingIntake) -> CoreResult<Booking> {
        intake.validate()?;
        let booking = self
            .bookings
            .insert_booking(intake.into_booking(Utc::now()))
            .await?;
        tracing::info!(
            "Booking {} created for user {} ({}, {} pax)",
            booking.id,
            booking.user_id,
            booking.route,
            booking.passengers
        );
        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }

    pub async fn history(&self, booking_id: Uuid) -> CoreResult<Vec<BookingUpdate>> {
        self.get(booking_id).await?;
        self.bookings.booking_history(booking_id).await
    }

    pub async fn list(&self, filter: &BookingFilter) -> CoreResult<Vec<Booking>> {
        let mut bookings = self.bookings.list_bookings(filter).await?;
        bookings.sort_by(listing_order);
        Ok(bookings)
    }

    /// Transition: Pending → PriceProposed
    pub async fn submit_price_proposal(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
        final_price: Decimal,
        currency: CurrencyCode,
        notes: Option<String>,
    ) -> CoreResult<Booking> {
        tracing::debug!(
            "Proposing {} {} for booking {} (notes {:?})",
            final_price,
            currency,
            booking_id,
            notes.as_ref().map(Masked::new)
        );
        self.execute(
            cap,
            booking_id,
            observed,
            Transition::ProposePrice {
                price: final_price,
                currency,
                notes,
            },
        )
        .await
    }

    /// Transition: PriceProposed → PaymentPending
    pub async fn advance_to_payment_pending(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
    ) -> CoreResult<Booking> {
        self.execute(cap, booking_id, observed, Transition::RequestPayment)
            .await
    }

    /// Transition: PaymentPending → Confirmed, only against a completed
    /// payment in the booking's currency for its final price.
    pub async fn confirm(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
    ) -> CoreResult<Booking> {
        self.execute(cap, booking_id, observed, Transition::Confirm)
            .await
    }

    /// Confirm now, or as soon as a matching payment settles.
    ///
    /// Re-evaluates on settlement events for the booking and gives up with
    /// `Timeout` after `settlement_timeout`.
    pub async fn confirm_when_settled(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
    ) -> CoreResult<Booking> {
        // Subscribe first so a settlement landing between the attempt and the
        // wait is still seen.
        let mut events = self.bus.subscribe(Topic::Booking(booking_id)).await?;

        match self.confirm(cap, booking_id, observed).await {
            Err(CoreError::PaymentMismatch(reason)) => {
                tracing::info!(
                    "Booking {} waiting for settlement ({}), up to {:?}",
                    booking_id,
                    reason,
                    self.settings.settlement_timeout
                );
            }
            other => return other,
        }

        let wait = async {
            while let Some(event) = events.next().await {
                let relevant = match &event {
                    DomainEvent::PaymentSettled(e) => e.status == PaymentStatus::Completed,
                    // Someone else moved the booking; the next attempt reports it.
                    DomainEvent::BookingTransitioned(_) => true,
                    _ => false,
                };
                if !relevant {
                    continue;
                }
                match self.confirm(cap, booking_id, observed).await {
                    Err(CoreError::PaymentMismatch(reason)) => {
                        tracing::debug!("Booking {} still unsettled: {}", booking_id, reason);
                    }
                    other => return other,
                }
            }
            Err(CoreError::StorageFailure(format!(
                "settlement stream for booking {} closed",
                booking_id
            )))
        };

        match tokio::time::timeout(self.settings.settlement_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Booking {} not settled in time", booking_id);
                Err(CoreError::Timeout(format!(
                    "no matching payment for booking {} within {:?}",
                    booking_id, self.settings.settlement_timeout
                )))
            }
        }
    }

    /// Cancel from any non-terminal status.
    pub async fn cancel(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
        reason: &str,
    ) -> CoreResult<Booking> {
        self.execute(
            cap,
            booking_id,
            observed,
            Transition::Cancel {
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// Transition: Confirmed → Completed
    pub async fn complete(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
    ) -> CoreResult<Booking> {
        self.execute(cap, booking_id, observed, Transition::Complete)
            .await
    }

    /// Like `execute`, but on a conflict or storage fault refetch the current
    /// status and try again under the retry policy. The edge check still
    /// applies to the refetched status.
    pub async fn execute_with_retry(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
        transition: Transition,
    ) -> CoreResult<Booking> {
        self.settings
            .retry
            .run(|attempt| {
                let transition = transition.clone();
                async move {
                    let observed = if attempt == 0 {
                        observed
                    } else {
                        let current = self.get(booking_id).await?.status;
                        tracing::info!(
                            "Refetched booking {} as {} for attempt {}",
                            booking_id,
                            current,
                            attempt + 1
                        );
                        current
                    };
                    self.execute(cap, booking_id, observed, transition).await
                }
            })
            .await
    }

    /// Apply one transition.
    pub async fn execute(
        &self,
        cap: &AdminCapability,
        booking_id: Uuid,
        observed: BookingStatus,
        transition: Transition,
    ) -> CoreResult<Booking> {
        // 1. Payload
        transition.validate()?;

        // 2. Load
        let booking = self.get(booking_id).await?;

        // 3. Caller must have seen the current status
        if booking.status != observed {
            return Err(CoreError::ConcurrentModification {
                expected: observed.to_string(),
                actual: booking.status.to_string(),
            });
        }

        // 4. Edge legality
        transition.check(booking.status)?;

        // 5. Payment correlation
        let settlement = match transition {
            Transition::Confirm => Some(self.settlement_for(&booking).await?),
            _ => None,
        };

        // 6. Commit booking, audit entry and notification together
        let now = Utc::now();
        let next = transition.apply(&booking, now);
        let route = next.route.to_string();
        let notification = {
            let notice = notice_for(&next, &route).ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "booking {} has nothing to announce for {}",
                    booking.id, next.status
                ))
            })?;
            self.notifications
                .compose_for_transition(booking.id, booking.user_id, &notice)
                .into_notification(now)
        };
        let update = BookingUpdate::new(
            booking.id,
            next.status,
            transition.audit_message(&next, settlement.as_ref().map(|p| p.id)),
            cap.actor_id(),
            now,
        );

        let committed = self
            .bookings
            .apply_transition(TransitionCommit {
                expected: observed,
                booking: next,
                update,
                notification,
            })
            .await?;

        tracing::info!(
            "Booking {} {} -> {} by {}",
            booking.id,
            booking.status,
            committed.booking.status,
            cap.actor_id()
        );

        // 7. Live delivery after commit
        if committed.notification_created {
            self.notifications.announce(&committed.notification).await;
        }
        let event = DomainEvent::BookingTransitioned(BookingTransitionedEvent {
            booking_id: booking.id,
            user_id: booking.user_id,
            from: booking.status,
            to: committed.booking.status,
            actor_id: cap.actor_id(),
            at: now,
        });
        if let Err(e) = self.bus.publish(Topic::Booking(booking.id), event).await {
            tracing::warn!("Failed to publish transition of booking {}: {}", booking.id, e);
        }

        Ok(committed.booking)
    }

    async fn settlement_for(&self, booking: &Booking) -> CoreResult<Payment> {
        let price = booking.final_price.ok_or_else(|| {
            CoreError::PaymentMismatch(format!("booking {} has no final price", booking.id))
        })?;
        self.ledger
            .find_settlement(
                booking.id,
                price,
                &booking.currency,
                self.settings.amount_epsilon,
            )
            .await
    }
}
