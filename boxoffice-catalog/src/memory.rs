use async_trait::async_trait;
use boxoffice_core::repository::{BookingRepository, EventRepository, UserRepository};
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::{Booking, BookingStatus, Event, EventStatistics, User};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::inventory::{Availability, EventLocks};

/// Event, booking and user store kept in process memory.
///
/// Used for local development and tests. Reservations follow the same
/// protocol as the Postgres store: the event's lock is held from the
/// availability check until the booking is inserted.
#[derive(Default)]
pub struct InMemoryStore {
    events: RwLock<HashMap<Uuid, Event>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    users: RwLock<HashMap<Uuid, User>>,
    locks: EventLocks,
    injected_failures: AtomicUsize,
    broken_bookings: Mutex<HashSet<Uuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` operations fail with `TransientStoreFailure`.
    pub fn fail_next(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Make every read or transition of booking `id` fail with
    /// `TransientStoreFailure` until [`InMemoryStore::repair_booking`].
    pub fn fail_booking(&self, id: Uuid) {
        self.broken().insert(id);
    }

    pub fn repair_booking(&self, id: Uuid) {
        self.broken().remove(&id);
    }

    /// Overwrite a booking's deadline, e.g. to simulate an elapsed window.
    pub async fn set_payment_deadline(&self, id: Uuid, deadline: DateTime<Utc>) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings.get_mut(&id).ok_or(CoreError::BookingNotFound(id))?;
        booking.payment_deadline = Some(deadline);
        Ok(())
    }

    fn broken(&self) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
        self.broken_bookings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_booking(&self, id: Uuid) -> CoreResult<()> {
        self.check_available()?;
        if self.broken().contains(&id) {
            return Err(CoreError::TransientStoreFailure(format!("booking {} unreadable", id)));
        }
        Ok(())
    }

    fn check_available(&self) -> CoreResult<()> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(CoreError::TransientStoreFailure("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn create_event(&self, event: &Event) -> CoreResult<()> {
        self.check_available()?;
        self.events.write().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>> {
        self.check_available()?;
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn list_events(&self) -> CoreResult<Vec<Event>> {
        self.check_available()?;
        let mut events: Vec<Event> = self.events.read().await.values().cloned().collect();
        events.sort_by_key(|e| e.date_time);
        Ok(events)
    }

    async fn update_event(&self, event: &Event) -> CoreResult<()> {
        self.check_available()?;
        let mut events = self.events.write().await;
        let stored = events.get_mut(&event.id).ok_or(CoreError::EventNotFound(event.id))?;
        stored.name = event.name.clone();
        stored.description = event.description.clone();
        stored.date_time = event.date_time;
        stored.ticket_price = event.ticket_price;
        stored.updated_at = event.updated_at;
        Ok(())
    }

    async fn event_statistics(&self, id: Uuid) -> CoreResult<Option<EventStatistics>> {
        self.check_available()?;
        let total_tickets = match self.events.read().await.get(&id) {
            Some(event) => event.total_tickets,
            None => return Ok(None),
        };

        let bookings = self.bookings.read().await;
        let of_event: Vec<&Booking> = bookings.values().filter(|b| b.event_id == id).collect();
        let availability = Availability::derive(total_tickets, of_event.iter().copied());
        let confirmed_revenue = of_event
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .map(|b| b.total_amount)
            .sum::<Decimal>();

        Ok(Some(EventStatistics {
            event_id: id,
            total_tickets,
            confirmed_tickets: availability.confirmed,
            pending_tickets: availability.pending,
            available_tickets: availability.available(),
            confirmed_revenue,
        }))
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create_with_reservation(&self, booking: &Booking) -> CoreResult<()> {
        self.check_available()?;

        let lock = self.locks.lock_for(booking.event_id);
        let _reservation = lock.lock().await;

        let total_tickets = self
            .events
            .read()
            .await
            .get(&booking.event_id)
            .map(|e| e.total_tickets)
            .ok_or(CoreError::EventNotFound(booking.event_id))?;

        let availability = {
            let bookings = self.bookings.read().await;
            Availability::derive(
                total_tickets,
                bookings.values().filter(|b| b.event_id == booking.event_id),
            )
        };
        availability.ensure(booking.quantity)?;

        self.bookings.write().await.insert(booking.id, booking.clone());
        debug!(
            booking_id = %booking.id,
            event_id = %booking.event_id,
            remaining = availability.available() - i64::from(booking.quantity),
            "Reserved tickets"
        );
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        self.check_booking(id)?;
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.check_available()?;
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> CoreResult<Booking> {
        self.check_booking(id)?;
        let mut bookings = self.bookings.write().await;
        let booking = bookings.get_mut(&id).ok_or(CoreError::BookingNotFound(id))?;

        if booking.status != from {
            return Err(CoreError::InvalidStateTransition {
                from: booking.status,
                to,
            });
        }

        booking.update_status(to);
        Ok(booking.clone())
    }

    async fn list_pending(&self) -> CoreResult<Vec<Booking>> {
        self.check_available()?;
        let mut pending: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.payment_deadline.is_some())
            .cloned()
            .collect();
        pending.sort_by_key(|b| b.payment_deadline);
        Ok(pending)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        self.check_available()?;
        let mut expired: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.is_expired_at(now))
            .cloned()
            .collect();
        expired.sort_by_key(|b| b.payment_deadline);
        Ok(expired)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        self.check_available()?;
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(CoreError::EmailTaken(user.email.clone()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        self.check_available()?;
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> CoreResult<()> {
        self.check_available()?;
        let mut users = self.users.write().await;
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(CoreError::EmailTaken(user.email.clone()));
        }
        let stored = users.get_mut(&user.id).ok_or(CoreError::UserNotFound(user.id))?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.updated_at = user.updated_at;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> CoreResult<()> {
        self.check_available()?;
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(CoreError::UserNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    async fn seeded_event(store: &InMemoryStore, total_tickets: i32) -> Event {
        let event = Event::new(
            "Concert".to_string(),
            String::new(),
            Utc::now() + Duration::days(7),
            total_tickets,
            Decimal::new(2000, 2),
        );
        store.create_event(&event).await.unwrap();
        event
    }

    fn pending_for(event: &Event, quantity: i32) -> Booking {
        Booking::pending(
            Uuid::new_v4(),
            event.id,
            quantity,
            event.ticket_price * Decimal::from(quantity),
            Utc::now() + Duration::minutes(15),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_reservations_never_oversell() {
        let store = Arc::new(InMemoryStore::new());
        let event = seeded_event(&store, 10).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let store = store.clone();
            let booking = pending_for(&event, 1);
            tasks.spawn(async move { store.create_with_reservation(&booking).await });
        }

        let mut succeeded = 0;
        let mut rejected = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(()) => succeeded += 1,
                Err(CoreError::InsufficientInventory { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(rejected, 10);
        let stats = store.event_statistics(event.id).await.unwrap().unwrap();
        assert_eq!(stats.pending_tickets, 10);
        assert_eq!(stats.available_tickets, 0);
    }

    #[tokio::test]
    async fn test_reservation_for_unknown_event() {
        let store = InMemoryStore::new();
        let booking = Booking::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            1,
            Decimal::ONE,
            Utc::now(),
        );

        let result = store.create_with_reservation(&booking).await;
        assert!(matches!(result, Err(CoreError::EventNotFound(_))));
        assert!(store.get_booking(booking.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = InMemoryStore::new();
        let event = seeded_event(&store, 5).await;
        let booking = pending_for(&event, 2);
        store.create_with_reservation(&booking).await.unwrap();

        let confirmed = store
            .transition_status(booking.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(confirmed.payment_deadline.is_none());

        let err = store
            .transition_status(booking.id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
            .unwrap_err();
        match err {
            CoreError::InvalidStateTransition { from, to } => {
                assert_eq!(from, BookingStatus::Confirmed);
                assert_eq!(to, BookingStatus::Cancelled);
            }
            other => panic!("expected InvalidStateTransition, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_frees_capacity() {
        let store = InMemoryStore::new();
        let event = seeded_event(&store, 5).await;
        let first = pending_for(&event, 3);
        store.create_with_reservation(&first).await.unwrap();

        let second = pending_for(&event, 3);
        assert!(matches!(
            store.create_with_reservation(&second).await,
            Err(CoreError::InsufficientInventory { requested: 3, available: 2 })
        ));

        store
            .transition_status(first.id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
            .unwrap();
        store.create_with_reservation(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_listing_respects_deadline_and_status() {
        let store = InMemoryStore::new();
        let event = seeded_event(&store, 10).await;
        let now = Utc::now();

        let overdue = pending_for(&event, 1);
        let fresh = pending_for(&event, 1);
        let paid = pending_for(&event, 1);
        for booking in [&overdue, &fresh, &paid] {
            store.create_with_reservation(booking).await.unwrap();
        }
        store.set_payment_deadline(overdue.id, now - Duration::seconds(1)).await.unwrap();
        store.set_payment_deadline(paid.id, now - Duration::seconds(5)).await.unwrap();
        store
            .transition_status(paid.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .unwrap();

        let expired = store.list_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, overdue.id);

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, overdue.id);
    }

    #[tokio::test]
    async fn test_update_keeps_capacity() {
        let store = InMemoryStore::new();
        let mut event = seeded_event(&store, 5).await;
        event.total_tickets = 500;
        event.ticket_price = Decimal::new(99, 0);
        store.update_event(&event).await.unwrap();

        let stored = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.total_tickets, 5);
        assert_eq!(stored.ticket_price, Decimal::new(99, 0));
    }

    #[tokio::test]
    async fn test_broken_booking_fails_until_repaired() {
        let store = InMemoryStore::new();
        let event = seeded_event(&store, 5).await;
        let booking = pending_for(&event, 1);
        store.create_with_reservation(&booking).await.unwrap();

        store.fail_booking(booking.id);
        assert!(matches!(
            store.get_booking(booking.id).await,
            Err(CoreError::TransientStoreFailure(_))
        ));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);

        store.repair_booking(booking.id);
        assert!(store.get_booking(booking.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_user_emails_are_unique() {
        let store = InMemoryStore::new();
        let ada = User::new("Ada".to_string(), "ada@example.com".to_string());
        let grace = User::new("Grace".to_string(), "grace@example.com".to_string());
        store.create_user(&ada).await.unwrap();
        store.create_user(&grace).await.unwrap();

        let clash = User::new("Other Ada".to_string(), "ada@example.com".to_string());
        assert!(matches!(store.create_user(&clash).await, Err(CoreError::EmailTaken(_))));

        let mut renamed = grace.clone();
        renamed.email = "ada@example.com".to_string();
        assert!(matches!(store.update_user(&renamed).await, Err(CoreError::EmailTaken(_))));

        store.delete_user(ada.id).await.unwrap();
        assert!(matches!(store.delete_user(ada.id).await, Err(CoreError::UserNotFound(_))));
        assert_eq!(store.list_users().await.unwrap(), vec![grace]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient() {
        let store = InMemoryStore::new();
        store.fail_next(2);

        assert!(matches!(store.list_events().await, Err(CoreError::TransientStoreFailure(_))));
        assert!(matches!(store.list_events().await, Err(CoreError::TransientStoreFailure(_))));
        assert!(store.list_events().await.is_ok());
    }
}
