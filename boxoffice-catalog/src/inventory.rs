use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::{Booking, BookingStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Ticket usage of one event, derived from booking statuses.
///
/// There is no stored counter: every reservation attempt recomputes this
/// from the bookings themselves, so cancelling a booking is all it takes to
/// release its tickets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub total_tickets: i32,
    pub pending: i64,
    pub confirmed: i64,
}

impl Availability {
    /// Sum the bookings of a single event. Callers filter by event.
    pub fn derive<'a, I>(total_tickets: i32, bookings: I) -> Self
    where
        I: IntoIterator<Item = &'a Booking>,
    {
        let mut availability = Self {
            total_tickets,
            ..Self::default()
        };

        for booking in bookings.into_iter().filter(|b| b.status.holds_inventory()) {
            let quantity = i64::from(booking.quantity);
            if booking.status == BookingStatus::Confirmed {
                availability.confirmed += quantity;
            } else {
                availability.pending += quantity;
            }
        }

        availability
    }

    pub fn reserved(&self) -> i64 {
        self.pending + self.confirmed
    }

    pub fn available(&self) -> i64 {
        i64::from(self.total_tickets) - self.reserved()
    }

    /// Fail with `InsufficientInventory` if `requested` tickets don't fit.
    pub fn ensure(&self, requested: i32) -> CoreResult<()> {
        let available = self.available();
        if available < i64::from(requested) {
            return Err(CoreError::InsufficientInventory {
                requested,
                available: available.max(0),
            });
        }
        Ok(())
    }
}

/// Reservation locks keyed by event id.
///
/// Reservations for the same event serialize on one mutex while different
/// events proceed independently. The outer map is only touched to look a
/// lock up, never while a reservation is in progress.
#[derive(Default)]
pub struct EventLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, event_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(event_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn booking(event_id: Uuid, quantity: i32, status: BookingStatus) -> Booking {
        let mut booking = Booking::pending(
            Uuid::new_v4(),
            event_id,
            quantity,
            Decimal::ZERO,
            Utc::now() + Duration::minutes(15),
        );
        booking.status = status;
        booking
    }

    #[test]
    fn test_cancelled_bookings_do_not_count() {
        let event_id = Uuid::new_v4();
        let bookings = vec![
            booking(event_id, 2, BookingStatus::Pending),
            booking(event_id, 3, BookingStatus::Confirmed),
            booking(event_id, 4, BookingStatus::Cancelled),
        ];

        let availability = Availability::derive(10, &bookings);
        assert_eq!(availability.pending, 2);
        assert_eq!(availability.confirmed, 3);
        assert_eq!(availability.available(), 5);
        assert_eq!(availability.reserved(), 5);
    }

    #[test]
    fn test_ensure_rejects_overbooking() {
        let event_id = Uuid::new_v4();
        let bookings = vec![booking(event_id, 3, BookingStatus::Pending)];
        let availability = Availability::derive(5, &bookings);

        assert!(availability.ensure(2).is_ok());
        match availability.ensure(3) {
            Err(CoreError::InsufficientInventory { requested, available }) => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientInventory, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_capacity_event() {
        let availability = Availability::derive(0, std::iter::empty());
        assert_eq!(availability.available(), 0);
        assert!(availability.ensure(1).is_err());
    }

    #[test]
    fn test_same_event_shares_one_lock() {
        let locks = EventLocks::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(Arc::ptr_eq(&locks.lock_for(a), &locks.lock_for(a)));
        assert!(!Arc::ptr_eq(&locks.lock_for(a), &locks.lock_for(b)));
    }

    #[tokio::test]
    async fn test_other_events_are_not_blocked() {
        let locks = EventLocks::new();
        let busy = locks.lock_for(Uuid::new_v4());
        let _held = busy.lock().await;

        let other = locks.lock_for(Uuid::new_v4());
        assert!(other.try_lock().is_ok());
        assert!(busy.try_lock().is_err());
    }
}
