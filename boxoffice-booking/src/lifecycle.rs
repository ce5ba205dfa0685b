use boxoffice_catalog::quote;
use boxoffice_core::queue::{PaymentQueue, QueueDepth};
use boxoffice_core::repository::{BookingRepository, EventRepository};
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::{Booking, BookingStatus, PaymentJob};
use chrono::{Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Tunables for booking creation.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// How long a Pending booking may wait for payment.
    pub payment_window: Duration,
}

impl BookingPolicy {
    /// Fails unless `minutes` is positive and representable.
    pub fn from_minutes(minutes: i64) -> CoreResult<Self> {
        if minutes <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "payment window must be positive, got {} minutes",
                minutes
            )));
        }
        let payment_window = Duration::try_minutes(minutes).ok_or_else(|| {
            CoreError::InvalidInput(format!("payment window of {} minutes is too long", minutes))
        })?;
        Ok(Self { payment_window })
    }
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            payment_window: Duration::minutes(15),
        }
    }
}

/// Result of a successful `create_booking`.
#[derive(Debug)]
pub enum BookingOutcome {
    /// Booking persisted and its payment job queued.
    Created(Booking),
    /// Booking persisted but the payment job could not be queued. The
    /// booking stays Pending: retry the enqueue or let it expire.
    PaymentDeferred { booking: Booking, reason: CoreError },
}

impl BookingOutcome {
    pub fn into_booking(self) -> Booking {
        match self {
            BookingOutcome::Created(booking) => booking,
            BookingOutcome::PaymentDeferred { booking, .. } => booking,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BookingOutcome::PaymentDeferred { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Requested,
    PaymentExpired,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => f.write_str("requested"),
            CancelReason::PaymentExpired => f.write_str("payment expired"),
        }
    }
}

/// Owns the booking state machine.
///
/// `Pending -> Confirmed` and `Pending -> Cancelled` are the only moves.
/// Every operation re-reads the store; nothing is cached between calls.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    events: Arc<dyn EventRepository>,
    payments: Arc<dyn PaymentQueue>,
    policy: BookingPolicy,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        events: Arc<dyn EventRepository>,
        payments: Arc<dyn PaymentQueue>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            bookings,
            events,
            payments,
            policy,
        }
    }

    /// Reserve `quantity` tickets and queue the payment.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        quantity: i32,
    ) -> CoreResult<BookingOutcome> {
        if quantity < 1 {
            return Err(CoreError::InvalidInput(format!(
                "quantity must be at least 1, got {}",
                quantity
            )));
        }

        let event = self
            .events
            .get_event(event_id)
            .await?
            .ok_or(CoreError::EventNotFound(event_id))?;

        let now = Utc::now();
        if !event.is_bookable_at(now) {
            return Err(CoreError::EventInPast {
                event_id,
                date_time: event.date_time,
            });
        }

        let total_amount = quote(quantity, event.ticket_price)?;
        let deadline = now
            .checked_add_signed(self.policy.payment_window)
            .ok_or_else(|| CoreError::InvalidInput("payment deadline out of range".to_string()))?;
        let booking = Booking::pending(user_id, event_id, quantity, total_amount, deadline);

        self.bookings.create_with_reservation(&booking).await?;
        info!(
            booking_id = %booking.id,
            event_id = %event_id,
            quantity,
            total_amount = %booking.total_amount,
            "Booking created"
        );

        let job = PaymentJob::new(booking.id, booking.total_amount);
        match self.payments.enqueue(&job).await {
            Ok(()) => Ok(BookingOutcome::Created(booking)),
            Err(reason) => {
                warn!(
                    booking_id = %booking.id,
                    error = %reason,
                    "Booking created but payment enqueue failed"
                );
                Ok(BookingOutcome::PaymentDeferred { booking, reason })
            }
        }
    }

    pub async fn get_booking(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(id)
            .await?
            .ok_or(CoreError::BookingNotFound(id))
    }

    pub async fn user_bookings(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.bookings.list_by_user(user_id).await
    }

    /// Transition: Pending → Cancelled. Frees the tickets implicitly.
    pub async fn cancel_booking(&self, id: Uuid) -> CoreResult<Booking> {
        self.cancel_with_reason(id, CancelReason::Requested).await
    }

    pub async fn cancel_with_reason(&self, id: Uuid, reason: CancelReason) -> CoreResult<Booking> {
        let booking = self.transition(id, BookingStatus::Cancelled).await?;
        info!(booking_id = %id, %reason, "Booking cancelled");
        Ok(booking)
    }

    /// Transition: Pending → Confirmed (payment captured)
    pub async fn confirm_booking(&self, id: Uuid) -> CoreResult<Booking> {
        let booking = self.transition(id, BookingStatus::Confirmed).await?;
        info!(booking_id = %id, "Booking confirmed");
        Ok(booking)
    }

    /// Queue the payment of a Pending booking again, e.g. after a
    /// degraded-success creation or a dead-lettered job. Refused while a job
    /// for the booking is still waiting or being processed.
    pub async fn retry_payment(&self, id: Uuid) -> CoreResult<Booking> {
        let booking = self.get_booking(id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::InvalidStateTransition {
                from: booking.status,
                to: BookingStatus::Confirmed,
            });
        }
        if self.payments.has_job(id).await? {
            return Err(CoreError::PaymentInProgress(id));
        }

        self.payments
            .enqueue(&PaymentJob::new(booking.id, booking.total_amount))
            .await?;
        info!(booking_id = %id, "Payment job re-queued");
        Ok(booking)
    }

    pub async fn pending_bookings(&self) -> CoreResult<Vec<Booking>> {
        self.bookings.list_pending().await
    }

    pub async fn payment_backlog(&self) -> CoreResult<QueueDepth> {
        self.payments.depth().await
    }

    pub async fn expired_bookings(&self, now: chrono::DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        self.bookings.list_expired(now).await
    }

    async fn transition(&self, id: Uuid, to: BookingStatus) -> CoreResult<Booking> {
        let current = self.get_booking(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(CoreError::InvalidStateTransition {
                from: current.status,
                to,
            });
        }

        // The store re-checks the status atomically; a racing transition
        // surfaces here as InvalidStateTransition.
        self.bookings.transition_status(id, current.status, to).await
    }
}
