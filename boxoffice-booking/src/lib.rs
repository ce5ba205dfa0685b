pub mod expiry;
pub mod gateway;
pub mod lifecycle;
pub mod queue;
pub mod retry;
pub mod worker;

pub use expiry::{ExpirySweeper, SweepReport};
pub use gateway::SimulatedGateway;
pub use lifecycle::{BookingOutcome, BookingPolicy, BookingService, CancelReason};
pub use queue::{DeadLetter, InMemoryPaymentQueue};
pub use retry::{retry_transient, RetryPolicy};
pub use worker::{start_payment_workers, JobOutcome, PaymentWorker};
