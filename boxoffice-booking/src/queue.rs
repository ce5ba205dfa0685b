use async_trait::async_trait;
use boxoffice_core::queue::{PaymentQueue, QueueDepth, QueuedJob};
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::PaymentJob;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub job: PaymentJob,
    pub reason: String,
}

#[derive(Default)]
struct Lanes {
    ready: VecDeque<QueuedJob>,
    in_flight: HashMap<String, QueuedJob>,
    dead: Vec<DeadLetter>,
}

/// Process-local payment queue with the same claim/ack protocol as the
/// Redis queue. Jobs do not survive a restart.
pub struct InMemoryPaymentQueue {
    lanes: Mutex<Lanes>,
    available: AtomicBool,
    notify: Notify,
}

impl InMemoryPaymentQueue {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes::default()),
            available: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// `QueueUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn ready_len(&self) -> usize {
        self.lanes().ready.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.lanes().in_flight.len()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lanes().dead.clone()
    }

    fn lanes(&self) -> MutexGuard<'_, Lanes> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> CoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::QueueUnavailable("in-memory queue switched off".to_string()))
        }
    }
}

impl Default for InMemoryPaymentQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentQueue for InMemoryPaymentQueue {
    async fn enqueue(&self, job: &PaymentJob) -> CoreResult<()> {
        self.ensure_available()?;
        self.lanes().ready.push_back(QueuedJob {
            job: job.clone(),
            receipt: Uuid::new_v4().to_string(),
        });
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> CoreResult<QueuedJob> {
        loop {
            self.ensure_available()?;
            {
                let mut lanes = self.lanes();
                if let Some(delivery) = lanes.ready.pop_front() {
                    lanes.in_flight.insert(delivery.receipt.clone(), delivery.clone());
                    return Ok(delivery);
                }
            }
            // notify_one stores a permit when nobody waits, so a push
            // between the check above and this await is not lost.
            self.notify.notified().await;
        }
    }

    async fn ack(&self, delivery: &QueuedJob) -> CoreResult<()> {
        self.ensure_available()?;
        self.lanes().in_flight.remove(&delivery.receipt);
        Ok(())
    }

    async fn dead_letter(&self, delivery: &QueuedJob, reason: &str) -> CoreResult<()> {
        self.ensure_available()?;
        let mut lanes = self.lanes();
        lanes.in_flight.remove(&delivery.receipt);
        lanes.dead.push(DeadLetter {
            job: delivery.job.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn requeue_unacked(&self) -> CoreResult<usize> {
        self.ensure_available()?;
        let recovered = {
            let mut lanes = self.lanes();
            let mut orphans: Vec<QueuedJob> = lanes.in_flight.drain().map(|(_, d)| d).collect();
            orphans.sort_by_key(|d| d.job.enqueued_at);
            let count = orphans.len();
            for orphan in orphans.into_iter().rev() {
                lanes.ready.push_front(orphan);
            }
            count
        };
        for _ in 0..recovered {
            self.notify.notify_one();
        }
        Ok(recovered)
    }

    async fn has_job(&self, booking_id: Uuid) -> CoreResult<bool> {
        self.ensure_available()?;
        let lanes = self.lanes();
        Ok(lanes
            .ready
            .iter()
            .chain(lanes.in_flight.values())
            .any(|d| d.job.booking_id == booking_id))
    }

    async fn depth(&self) -> CoreResult<QueueDepth> {
        self.ensure_available()?;
        let lanes = self.lanes();
        Ok(QueueDepth {
            ready: lanes.ready.len(),
            in_flight: lanes.in_flight.len(),
            dead: lanes.dead.len(),
        })
    }
}
