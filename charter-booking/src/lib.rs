pub mod models;
pub mod transition;
pub mod repository;
pub mod workflow;
pub mod reconcile;

pub use models::{Booking, BookingFilter, BookingIntake, BookingUpdate, Route, MAX_PASSENGERS};
pub use transition::{CommittedTransition, Transition, TransitionCommit};
pub use repository::BookingRepository;
pub use workflow::{BookingWorkflow, WorkflowSettings};
pub use reconcile::{ReconcileReport, Reconciler};
