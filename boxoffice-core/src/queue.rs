use async_trait::async_trait;
use boxoffice_shared::PaymentJob;
use serde::Serialize;
use uuid::Uuid;

use crate::CoreResult;

/// A job handed out by [`PaymentQueue::dequeue`].
///
/// The job stays in the queue's processing area until it is acknowledged or
/// dead-lettered; `receipt` identifies it there.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub job: PaymentJob,
    pub receipt: String,
}

/// Job counts per lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub ready: usize,
    pub in_flight: usize,
    pub dead: usize,
}

/// Durable at-least-once FIFO of payment jobs.
#[async_trait]
pub trait PaymentQueue: Send + Sync {
    async fn enqueue(&self, job: &PaymentJob) -> CoreResult<()>;

    /// Wait until a job is available and claim it. Never busy-polls.
    async fn dequeue(&self) -> CoreResult<QueuedJob>;

    /// The job's effect is durable; forget it.
    async fn ack(&self, delivery: &QueuedJob) -> CoreResult<()>;

    /// Park the job for manual inspection.
    async fn dead_letter(&self, delivery: &QueuedJob, reason: &str) -> CoreResult<()>;

    /// Move claimed but unacknowledged jobs back to the queue. Returns how
    /// many were recovered.
    async fn requeue_unacked(&self) -> CoreResult<usize>;

    /// Whether a job for `booking_id` is waiting or claimed.
    async fn has_job(&self, booking_id: Uuid) -> CoreResult<bool>;

    async fn depth(&self) -> CoreResult<QueueDepth>;
}
