use async_trait::async_trait;
use charter_booking::models::listing_order;
use charter_booking::{
    Booking, BookingFilter, BookingRepository, BookingUpdate, CommittedTransition,
    TransitionCommit,
};
use charter_chat::{ChatMessage, ChatRepository, NewChatMessage, ReadReceipt, ThreadSummary};
use charter_core::{CoreError, CoreResult};
use charter_ledger::{Payment, PaymentRepository, TimeWindow};
use charter_notify::{IdempotencyKey, Notification, NotificationRepository};
use charter_shared::PaymentStatus;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    bookings: HashMap<Uuid, Booking>,
    updates: Vec<BookingUpdate>,
    notifications: Vec<Notification>,
    notification_keys: HashMap<IdempotencyKey, usize>,
    payments: Vec<Payment>,
    chat_seq: i64,
    messages: Vec<ChatMessage>,
    threads: HashMap<Uuid, ThreadSummary>,
}

impl State {
    /// Insert unless the key is taken. Returns the stored row and whether it is new.
    fn insert_notification(&mut self, notification: Notification) -> (Notification, bool) {
        if let Some(key) = &notification.idempotency_key {
            if let Some(&index) = self.notification_keys.get(key) {
                return (self.notifications[index].clone(), false);
            }
            self.notification_keys
                .insert(key.clone(), self.notifications.len());
        }
        self.notifications.push(notification.clone());
        (notification, true)
    }
}

/// Single-node store backing every repository port. One write lock covers all
/// record kinds, so a transition's three writes land together or not at all.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `apply_transition` fail with `StorageFailure` before
    /// writing anything. Lets tests exercise rollback.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Remove the audit entries and notifications of a booking, leaving the
    /// booking row in place, as a crash between writes would.
    pub async fn forget_side_effects(&self, booking_id: Uuid) {
        let mut state = self.state.write().await;
        state.updates.retain(|u| u.booking_id != booking_id);

        let prefix = format!("{}:", booking_id);
        state.notifications.retain(|n| {
            !n.idempotency_key
                .as_ref()
                .is_some_and(|k| k.as_str().starts_with(&prefix))
        });
        let reindexed: HashMap<IdempotencyKey, usize> = state
            .notifications
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.idempotency_key.clone().map(|k| (k, i)))
            .collect();
        state.notification_keys = reindexed;
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_booking(&self, booking: Booking) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> CoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut found: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        found.sort_by(listing_order);
        Ok(found)
    }

    async fn apply_transition(&self, commit: TransitionCommit) -> CoreResult<CommittedTransition> {
        let mut state = self.state.write().await;

        let current = state
            .bookings
            .get(&commit.booking.id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", commit.booking.id)))?
            .status;
        if current != commit.expected {
            return Err(CoreError::ConcurrentModification {
                expected: commit.expected.to_string(),
                actual: current.to_string(),
            });
        }
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CoreError::StorageFailure(
                "injected failure before commit".to_string(),
            ));
        }

        state.bookings.insert(commit.booking.id, commit.booking.clone());
        state.updates.push(commit.update.clone());
        let (notification, notification_created) = state.insert_notification(commit.notification);

        Ok(CommittedTransition {
            booking: commit.booking,
            update: commit.update,
            notification,
            notification_created,
        })
    }

    async fn booking_history(&self, booking_id: Uuid) -> CoreResult<Vec<BookingUpdate>> {
        let state = self.state.read().await;
        Ok(state
            .updates
            .iter()
            .filter(|u| u.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn append_update(&self, update: BookingUpdate) -> CoreResult<BookingUpdate> {
        let mut state = self.state.write().await;
        if !state.bookings.contains_key(&update.booking_id) {
            return Err(CoreError::NotFound(format!("booking {}", update.booking_id)));
        }
        state.updates.push(update.clone());
        Ok(update)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(
        &self,
        notification: Notification,
    ) -> CoreResult<(Notification, bool)> {
        Ok(self.state.write().await.insert_notification(notification))
    }

    async fn find_notification_by_key(
        &self,
        key: &IdempotencyKey,
    ) -> CoreResult<Option<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notification_keys
            .get(key)
            .map(|&i| state.notifications[i].clone()))
    }

    async fn list_notifications(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notifications_read(&self, ids: &[Uuid]) -> CoreResult<usize> {
        let mut state = self.state.write().await;
        let positions: HashMap<Uuid, usize> = state
            .notifications
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();
        if let Some(missing) = ids.iter().find(|id| !positions.contains_key(id)) {
            return Err(CoreError::NotFound(format!("notification {}", missing)));
        }
        for id in ids {
            state.notifications[positions[id]].read = true;
        }
        Ok(ids.len())
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> CoreResult<usize> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert_payment(&self, payment: Payment) -> CoreResult<Payment> {
        self.state.write().await.payments.push(payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn settle_payment(
        &self,
        id: Uuid,
        outcome: PaymentStatus,
        transaction_ref: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("payment {}", id)))?;
        payment.settle(outcome, transaction_ref, at)?;
        Ok(payment.clone())
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.booking_id == Some(booking_id))
            .cloned()
            .collect())
    }

    async fn payments_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_payments(&self, window: Option<&TimeWindow>) -> CoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| window.map_or(true, |w| w.contains(p.created_at)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn append_message(
        &self,
        message: NewChatMessage,
    ) -> CoreResult<(ChatMessage, ThreadSummary)> {
        let mut state = self.state.write().await;
        state.chat_seq += 1;
        let stored = ChatMessage {
            id: state.chat_seq,
            user_id: message.user_id,
            content: message.content,
            sender: message.sender,
            read: false,
            created_at: Utc::now(),
        };
        state.messages.push(stored.clone());

        let unread = u32::from(stored.sender.counts_as_unread());
        let thread = state
            .threads
            .entry(stored.user_id)
            .or_insert_with(|| ThreadSummary {
                user_id: stored.user_id,
                last_message_id: stored.id,
                last_message_at: stored.created_at,
                last_sender: stored.sender,
                preview: String::new(),
                unread_count: 0,
                message_count: 0,
            });
        thread.last_message_id = stored.id;
        thread.last_message_at = stored.created_at;
        thread.last_sender = stored.sender;
        thread.preview = message.preview;
        thread.unread_count += unread;
        thread.message_count += 1;
        let summary = thread.clone();

        Ok((stored, summary))
    }

    async fn thread_messages(&self, user_id: Uuid) -> CoreResult<Vec<ChatMessage>> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn thread_summary(&self, user_id: Uuid) -> CoreResult<Option<ThreadSummary>> {
        Ok(self.state.read().await.threads.get(&user_id).cloned())
    }

    async fn thread_summaries(&self) -> CoreResult<Vec<ThreadSummary>> {
        Ok(self.state.read().await.threads.values().cloned().collect())
    }

    async fn mark_thread_read(&self, user_id: Uuid, up_to: Option<i64>) -> CoreResult<ReadReceipt> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let thread = state
            .threads
            .get_mut(&user_id)
            .ok_or_else(|| CoreError::NotFound(format!("chat thread {}", user_id)))?;
        let cutoff = up_to.map_or(thread.last_message_id, |id| id.min(thread.last_message_id));

        let mut marked = 0;
        for message in state.messages.iter_mut().filter(|m| {
            m.user_id == user_id && m.id <= cutoff && !m.read && m.sender.counts_as_unread()
        }) {
            message.read = true;
            marked += 1;
        }
        thread.unread_count = thread.unread_count.saturating_sub(marked);

        Ok(ReadReceipt {
            cutoff_id: cutoff,
            marked,
            unread_count: thread.unread_count,
        })
    }
}
