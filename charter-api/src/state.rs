use std::sync::Arc;

use charter_booking::{BookingWorkflow, Reconciler, WorkflowSettings};
use charter_chat::{ChatChannel, ChatSettings};
use charter_core::EventBus;
use charter_ledger::PaymentLedger;
use charter_notify::NotificationDispatcher;
use charter_store::Backends;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub webhook_secret: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<BookingWorkflow>,
    pub ledger: Arc<PaymentLedger>,
    pub notifications: Arc<NotificationDispatcher>,
    pub chat: Arc<ChatChannel>,
    pub reconciler: Arc<Reconciler>,
    /// Live feeds for SSE subscribers.
    pub bus: Arc<dyn EventBus>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire the domain services over whichever adapters were selected.
    pub fn new(
        backends: Backends,
        auth: AuthConfig,
        workflow: WorkflowSettings,
        chat: ChatSettings,
    ) -> Self {
        let ledger = Arc::new(PaymentLedger::new(backends.payments, backends.bus.clone()));
        let notifications = Arc::new(NotificationDispatcher::new(
            backends.notifications,
            backends.bus.clone(),
        ));
        let booking_workflow = Arc::new(BookingWorkflow::new(
            backends.bookings.clone(),
            ledger.clone(),
            notifications.clone(),
            backends.bus.clone(),
            workflow,
        ));
        let reconciler = Arc::new(Reconciler::new(backends.bookings, notifications.clone()));
        let chat = Arc::new(ChatChannel::new(backends.chat, backends.bus.clone(), chat));

        Self {
            workflow: booking_workflow,
            ledger,
            notifications,
            chat,
            reconciler,
            bus: backends.bus,
            auth,
        }
    }
}
