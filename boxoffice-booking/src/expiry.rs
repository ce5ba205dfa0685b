use crate::lifecycle::{BookingService, CancelReason};
use crate::retry::{retry_transient, RetryPolicy};
use boxoffice_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Tally of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub found: usize,
    pub cancelled: usize,
    /// Confirmed or cancelled by someone else before we got to them.
    pub skipped: usize,
    pub failed: usize,
}

/// Periodically cancels Pending bookings whose payment deadline has passed.
///
/// A ticket is held at most `payment_deadline + interval`.
pub struct ExpirySweeper {
    service: Arc<BookingService>,
    interval: Duration,
    retry: RetryPolicy,
}

impl ExpirySweeper {
    pub fn new(service: Arc<BookingService>, interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            service,
            interval,
            retry,
        }
    }

    /// Cancel everything that expired before `now`. Individual failures are
    /// counted, never propagated; only failing to list is an error.
    pub async fn sweep(&self, now: DateTime<Utc>) -> CoreResult<SweepReport> {
        let expired = retry_transient(&self.retry, "list_expired", || {
            self.service.expired_bookings(now)
        })
        .await?;

        let mut report = SweepReport {
            found: expired.len(),
            ..SweepReport::default()
        };

        for booking in expired {
            let result = retry_transient(&self.retry, "expire_booking", || {
                self.service
                    .cancel_with_reason(booking.id, CancelReason::PaymentExpired)
            })
            .await;

            match result {
                Ok(_) => report.cancelled += 1,
                Err(CoreError::InvalidStateTransition { from, .. }) => {
                    debug!(booking_id = %booking.id, status = %from, "Booking settled before expiry");
                    report.skipped += 1;
                }
                Err(CoreError::BookingNotFound(_)) => report.skipped += 1,
                Err(err) => {
                    error!(booking_id = %booking.id, error = %err, "Failed to expire booking");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Sweep every `interval` until `shutdown` flips to true. A sweep in
    /// progress is finished before returning.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            match self.sweep(Utc::now()).await {
                Ok(report) if report.found > 0 => info!(
                    found = report.found,
                    cancelled = report.cancelled,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Expired bookings swept"
                ),
                Ok(_) => debug!("No expired bookings"),
                Err(err) => warn!(error = %err, "Expiry sweep skipped, will retry next tick"),
            }
        }

        info!("Expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::BookingPolicy;
    use crate::queue::InMemoryPaymentQueue;
    use boxoffice_catalog::InMemoryStore;
    use boxoffice_core::repository::EventRepository;
    use boxoffice_shared::{BookingStatus, Event};
    use chrono::Duration as ChronoDuration;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    struct Harness {
        store: Arc<InMemoryStore>,
        service: Arc<BookingService>,
        sweeper: ExpirySweeper,
        event: Event,
    }

    async fn harness(total: i32) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let service = Arc::new(BookingService::new(
            store.clone(),
            store.clone(),
            Arc::new(InMemoryPaymentQueue::new()),
            BookingPolicy::default(),
        ));
        let event = Event::new(
            "Derby".to_string(),
            String::new(),
            Utc::now() + ChronoDuration::days(7),
            total,
            Decimal::new(1250, 2),
        );
        store.create_event(&event).await.unwrap();
        let retry = RetryPolicy::builder()
            .max_retries(1)
            .initial_delay(Duration::from_millis(1))
            .build();
        let sweeper = ExpirySweeper::new(service.clone(), Duration::from_millis(20), retry);
        Harness {
            store,
            service,
            sweeper,
            event,
        }
    }

    async fn book(h: &Harness, quantity: i32) -> Uuid {
        h.service
            .create_booking(Uuid::new_v4(), h.event.id, quantity)
            .await
            .unwrap()
            .into_booking()
            .id
    }

    async fn expire(h: &Harness, id: Uuid) {
        h.store
            .set_payment_deadline(id, Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_cancels_only_expired() {
        let h = harness(10).await;
        let stale = book(&h, 2).await;
        let fresh = book(&h, 2).await;
        expire(&h, stale).await;

        let report = h.sweeper.sweep(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport { found: 1, cancelled: 1, skipped: 0, failed: 0 });

        assert_eq!(h.service.get_booking(stale).await.unwrap().status, BookingStatus::Cancelled);
        assert_eq!(h.service.get_booking(fresh).await.unwrap().status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_expired_tickets_become_bookable() {
        let h = harness(3).await;
        let stale = book(&h, 3).await;
        assert!(matches!(
            h.service.create_booking(Uuid::new_v4(), h.event.id, 1).await,
            Err(CoreError::InsufficientInventory { .. })
        ));

        expire(&h, stale).await;
        h.sweeper.sweep(Utc::now()).await.unwrap();

        assert!(h.service.create_booking(Uuid::new_v4(), h.event.id, 3).await.is_ok());
    }

    #[tokio::test]
    async fn test_second_sweep_is_a_no_op() {
        let h = harness(5).await;
        let stale = book(&h, 1).await;
        expire(&h, stale).await;

        h.sweeper.sweep(Utc::now()).await.unwrap();
        let report = h.sweeper.sweep(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_transient_listing_failure_is_retried() {
        let h = harness(5).await;
        let stale = book(&h, 1).await;
        expire(&h, stale).await;

        h.store.fail_next(1);
        let report = h.sweeper.sweep(Utc::now()).await.unwrap();
        assert_eq!(report.cancelled, 1);
    }

    #[tokio::test]
    async fn test_one_failing_booking_does_not_abort_the_sweep() {
        let h = harness(10).await;
        let first = book(&h, 1).await;
        let stuck = book(&h, 1).await;
        let last = book(&h, 1).await;
        for id in [first, stuck, last] {
            expire(&h, id).await;
        }

        h.store.fail_booking(stuck);
        let report = h.sweeper.sweep(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport { found: 3, cancelled: 2, skipped: 0, failed: 1 });

        h.store.repair_booking(stuck);
        assert_eq!(h.service.get_booking(first).await.unwrap().status, BookingStatus::Cancelled);
        assert_eq!(h.service.get_booking(last).await.unwrap().status, BookingStatus::Cancelled);
        assert_eq!(h.service.get_booking(stuck).await.unwrap().status, BookingStatus::Pending);

        let retry = h.sweeper.sweep(Utc::now()).await.unwrap();
        assert_eq!(retry, SweepReport { found: 1, cancelled: 1, skipped: 0, failed: 0 });
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness(5).await;
        let stale = book(&h, 1).await;
        expire(&h, stale).await;

        let sweeper = Arc::new(h.sweeper);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sweeper.run(rx));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while h.service.get_booking(stale).await.unwrap().status != BookingStatus::Cancelled {
            assert!(tokio::time::Instant::now() < deadline, "sweeper never ran");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper stopped")
            .unwrap();
    }
}
