//! Property: no sequence of reservations and cancellations pushes an event
//! past its capacity, and availability always equals capacity minus the
//! quantities of live bookings.

use boxoffice_catalog::InMemoryStore;
use boxoffice_core::repository::{BookingRepository, EventRepository};
use boxoffice_core::CoreError;
use boxoffice_shared::{Booking, BookingStatus, Event};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Reserve(i32),
    Cancel(usize),
    Confirm(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1..5i32).prop_map(Op::Reserve),
        1 => any::<usize>().prop_map(Op::Cancel),
        1 => any::<usize>().prop_map(Op::Confirm),
    ]
}

proptest! {
    #[test]
    fn reserved_never_exceeds_capacity(capacity in 0..20i32, ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        runtime.block_on(async {
            let store = InMemoryStore::new();
            let event = Event::new(
                "Recital".to_string(),
                String::new(),
                Utc::now() + Duration::days(1),
                capacity,
                Decimal::ONE,
            );
            store.create_event(&event).await.unwrap();

            let mut live: Vec<(Uuid, i32)> = Vec::new();

            for op in ops {
                match op {
                    Op::Reserve(quantity) => {
                        let booking = Booking::pending(
                            Uuid::new_v4(),
                            event.id,
                            quantity,
                            Decimal::from(quantity),
                            Utc::now() + Duration::minutes(15),
                        );
                        let held: i32 = live.iter().map(|(_, q)| q).sum();
                        match store.create_with_reservation(&booking).await {
                            Ok(()) => {
                                prop_assert!(held + quantity <= capacity);
                                live.push((booking.id, quantity));
                            }
                            Err(CoreError::InsufficientInventory { .. }) => {
                                prop_assert!(held + quantity > capacity);
                            }
                            Err(e) => prop_assert!(false, "unexpected error {}", e),
                        }
                    }
                    Op::Cancel(index) if !live.is_empty() => {
                        let (id, _) = live.remove(index % live.len());
                        let result = store
                            .transition_status(id, BookingStatus::Pending, BookingStatus::Cancelled)
                            .await;
                        // Confirmed bookings stay live; the rest are freed.
                        if result.is_err() {
                            live.push((id, store.get_booking(id).await.unwrap().unwrap().quantity));
                        }
                    }
                    Op::Confirm(index) if !live.is_empty() => {
                        let (id, _) = live[index % live.len()];
                        let _ = store
                            .transition_status(id, BookingStatus::Pending, BookingStatus::Confirmed)
                            .await;
                    }
                    _ => {}
                }

                let stats = store.event_statistics(event.id).await.unwrap().unwrap();
                let held: i64 = live.iter().map(|(_, q)| i64::from(*q)).sum();
                prop_assert!(stats.pending_tickets + stats.confirmed_tickets <= i64::from(capacity));
                prop_assert_eq!(stats.pending_tickets + stats.confirmed_tickets, held);
                prop_assert_eq!(stats.available_tickets, i64::from(capacity) - held);
            }
            Ok(())
        })?;
    }
}
