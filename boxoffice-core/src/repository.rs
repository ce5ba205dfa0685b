use async_trait::async_trait;
use boxoffice_shared::{Booking, BookingStatus, Event, EventStatistics, User};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::CoreResult;

/// Repository trait for the event catalog
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create_event(&self, event: &Event) -> CoreResult<()>;

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>>;

    /// All events ordered by `date_time`.
    async fn list_events(&self) -> CoreResult<Vec<Event>>;

    /// Persist descriptive fields and price. `total_tickets` is never written.
    async fn update_event(&self, event: &Event) -> CoreResult<()>;

    async fn event_statistics(&self, id: Uuid) -> CoreResult<Option<EventStatistics>>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a Pending booking while holding the event's reservation lock.
    ///
    /// Availability is recomputed from the Pending and Confirmed bookings of
    /// the event inside the same atomic scope as the insert, so concurrent
    /// callers can never both observe stale capacity. Fails with
    /// `EventNotFound` or `InsufficientInventory` without writing anything.
    async fn create_with_reservation(&self, booking: &Booking) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>>;

    /// Compare-and-set on the status column.
    ///
    /// Succeeds only if the booking is currently `from`; otherwise fails with
    /// `InvalidStateTransition` carrying the status actually found, or
    /// `BookingNotFound`.
    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> CoreResult<Booking>;

    /// Pending bookings, earliest deadline first.
    async fn list_pending(&self) -> CoreResult<Vec<Booking>>;

    /// Pending bookings whose deadline is strictly before `now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<Booking>>;
}

/// Account records. Bookings reference users by id only.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `EmailTaken` when the address is already registered.
    async fn create_user(&self, user: &User) -> CoreResult<()>;

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    /// Newest first.
    async fn list_users(&self) -> CoreResult<Vec<User>>;

    /// Fails with `UserNotFound` or `EmailTaken`.
    async fn update_user(&self, user: &User) -> CoreResult<()>;

    /// Fails with `UserNotFound`.
    async fn delete_user(&self, id: Uuid) -> CoreResult<()>;
}
