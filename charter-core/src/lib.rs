pub mod identity;
pub mod pubsub;
pub mod retry;

pub use identity::{Actor, AdminCapability, Role, SYSTEM_ACTOR};
pub use pubsub::{EventBus, InProcessBus, Subscription, Topic};
pub use retry::RetryPolicy;

/// Error taxonomy shared by every charter crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Concurrent modification: expected {expected}, found {actual}")]
    ConcurrentModification { expected: String, actual: String },
    #[error("Payment mismatch: {0}")]
    PaymentMismatch(String),
    #[error("Already terminal: {0}")]
    AlreadyTerminal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl CoreError {
    /// Stable machine-readable classification shown to operators.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::ValidationError(_) => "validation_error",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::ConcurrentModification { .. } => "concurrent_modification",
            CoreError::PaymentMismatch(_) => "payment_mismatch",
            CoreError::AlreadyTerminal(_) => "already_terminal",
            CoreError::NotFound(_) => "not_found",
            CoreError::Timeout(_) => "timeout",
            CoreError::StorageFailure(_) => "storage_failure",
        }
    }

    /// Only conflicts and storage faults are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::ConcurrentModification { .. } | CoreError::StorageFailure(_)
        )
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        CoreError::StorageFailure(err.to_string())
    }
}

impl From<charter_shared::UnknownVariant> for CoreError {
    fn from(err: charter_shared::UnknownVariant) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

impl From<charter_shared::money::InvalidCurrency> for CoreError {
    fn from(err: charter_shared::money::InvalidCurrency) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
