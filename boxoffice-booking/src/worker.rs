use crate::lifecycle::BookingService;
use crate::retry::{retry_transient, RetryPolicy};
use boxoffice_core::payment::{PaymentGateway, PaymentStatus};
use boxoffice_core::queue::{PaymentQueue, QueuedJob};
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::BookingStatus;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What happened to one delivered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Charged and confirmed.
    Confirmed,
    /// Replay for a booking that is already Confirmed. Nothing charged.
    AlreadyConfirmed,
    /// Booking gone, cancelled or payment declined. Acknowledged without
    /// effect.
    Dropped,
    /// Retry budget spent on a transient failure.
    DeadLettered,
}

/// Consumes payment jobs: charge through the gateway, then confirm.
pub struct PaymentWorker {
    service: Arc<BookingService>,
    queue: Arc<dyn PaymentQueue>,
    gateway: Arc<dyn PaymentGateway>,
    retry: RetryPolicy,
}

impl PaymentWorker {
    pub fn new(
        service: Arc<BookingService>,
        queue: Arc<dyn PaymentQueue>,
        gateway: Arc<dyn PaymentGateway>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            queue,
            gateway,
            retry,
        }
    }

    /// Put jobs abandoned by a previous crash back on the queue.
    pub async fn recover(&self) -> CoreResult<usize> {
        let recovered = retry_transient(&self.retry, "requeue_unacked", || {
            self.queue.requeue_unacked()
        })
        .await?;
        if recovered > 0 {
            info!(recovered, "Re-queued unacknowledged payment jobs");
        }
        Ok(recovered)
    }

    /// Process one delivery to completion. The delivery is always either
    /// acknowledged or dead-lettered unless the queue itself is down.
    pub async fn handle(&self, delivery: &QueuedJob) -> CoreResult<JobOutcome> {
        let booking_id = delivery.job.booking_id;

        let booking = match retry_transient(&self.retry, "load_booking", || {
            self.service.get_booking(booking_id)
        })
        .await
        {
            Ok(booking) => booking,
            Err(CoreError::BookingNotFound(_)) => {
                warn!(%booking_id, "Payment job for unknown booking, dropping");
                return self.finish(delivery, JobOutcome::Dropped).await;
            }
            Err(err) => return self.park(delivery, &err).await,
        };

        match booking.status {
            BookingStatus::Confirmed => {
                debug!(%booking_id, "Replayed payment job, booking already confirmed");
                return self.finish(delivery, JobOutcome::AlreadyConfirmed).await;
            }
            BookingStatus::Cancelled => {
                warn!(%booking_id, "Payment arrived after cancellation, dropping");
                return self.finish(delivery, JobOutcome::Dropped).await;
            }
            BookingStatus::Pending => {}
        }

        let receipt = match retry_transient(&self.retry, "charge", || {
            self.gateway.charge(&delivery.job)
        })
        .await
        {
            Ok(receipt) => receipt,
            Err(err) => return self.park(delivery, &err).await,
        };

        if receipt.status == PaymentStatus::Declined {
            // The booking stays Pending and expires through the sweeper.
            warn!(%booking_id, reference = %receipt.reference, "Payment declined");
            return self.finish(delivery, JobOutcome::Dropped).await;
        }

        // Only the confirm step is retried from here on; the charge stands.
        match retry_transient(&self.retry, "confirm", || {
            self.service.confirm_booking(booking_id)
        })
        .await
        {
            Ok(_) => {
                info!(%booking_id, reference = %receipt.reference, "Payment captured");
                self.finish(delivery, JobOutcome::Confirmed).await
            }
            Err(CoreError::InvalidStateTransition {
                from: BookingStatus::Confirmed,
                ..
            }) => {
                debug!(%booking_id, "Confirmed concurrently by another delivery");
                self.finish(delivery, JobOutcome::AlreadyConfirmed).await
            }
            Err(err @ (CoreError::InvalidStateTransition { .. } | CoreError::BookingNotFound(_))) => {
                warn!(
                    %booking_id,
                    reference = %receipt.reference,
                    error = %err,
                    "Booking no longer pending after charge, dropping"
                );
                self.finish(delivery, JobOutcome::Dropped).await
            }
            Err(err) => self.park(delivery, &err).await,
        }
    }

    /// Consume until `shutdown` flips to true. A job being processed when
    /// the signal arrives is finished first.
    pub async fn run(self: Arc<Self>, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id, "Payment worker started");
        let mut failures = 0usize;

        while !*shutdown.borrow() {
            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = self.queue.dequeue() => next,
            };

            match next {
                Ok(delivery) => {
                    failures = 0;
                    if let Err(err) = self.handle(&delivery).await {
                        error!(
                            worker_id,
                            booking_id = %delivery.job.booking_id,
                            error = %err,
                            "Failed to settle payment job; it stays claimed until recovery"
                        );
                    }
                }
                Err(err) => {
                    let delay = self.retry.delay_for_attempt(failures);
                    failures = failures.saturating_add(1);
                    warn!(worker_id, error = %err, delay_ms = delay.as_millis() as u64, "Dequeue failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(worker_id, "Payment worker stopped");
    }

    async fn finish(&self, delivery: &QueuedJob, outcome: JobOutcome) -> CoreResult<JobOutcome> {
        retry_transient(&self.retry, "ack", || self.queue.ack(delivery)).await?;
        Ok(outcome)
    }

    async fn park(&self, delivery: &QueuedJob, cause: &CoreError) -> CoreResult<JobOutcome> {
        error!(
            booking_id = %delivery.job.booking_id,
            error = %cause,
            "Payment job exhausted its retries, moving to dead letters"
        );
        let reason = cause.to_string();
        retry_transient(&self.retry, "dead_letter", || {
            self.queue.dead_letter(delivery, &reason)
        })
        .await?;
        Ok(JobOutcome::DeadLettered)
    }
}

/// Recover orphaned jobs, then spawn `count` workers sharing one queue.
pub async fn start_payment_workers(
    worker: Arc<PaymentWorker>,
    count: usize,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    if let Err(err) = worker.recover().await {
        error!(error = %err, "Could not recover unacknowledged payment jobs");
    }

    (0..count.max(1))
        .map(|worker_id| tokio::spawn(worker.clone().run(worker_id, shutdown.clone())))
        .collect()
}
