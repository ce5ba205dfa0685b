pub mod payment;
pub mod queue;
pub mod repository;

use boxoffice_shared::BookingStatus;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Event not found: {0}")]
    EventNotFound(Uuid),
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),
    #[error("User not found: {0}")]
    UserNotFound(Uuid),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Event {event_id} took place at {date_time}, bookings are closed")]
    EventInPast {
        event_id: Uuid,
        date_time: DateTime<Utc>,
    },
    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i32, available: i64 },
    #[error("Email already registered: {0}")]
    EmailTaken(String),
    #[error("Payment for booking {0} is already queued")]
    PaymentInProgress(Uuid),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Store unavailable: {0}")]
    TransientStoreFailure(String),
    #[error("Payment queue unavailable: {0}")]
    QueueUnavailable(String),
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
}

impl CoreError {
    /// Infrastructure failures that may succeed on a later attempt.
    /// Domain rule violations are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::TransientStoreFailure(_)
                | CoreError::QueueUnavailable(_)
                | CoreError::GatewayUnavailable(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
