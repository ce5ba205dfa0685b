use async_trait::async_trait;
use boxoffice_core::payment::{PaymentGateway, PaymentReceipt, PaymentStatus};
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::PaymentJob;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

/// Stand-in payment processor: waits `latency`, then approves every charge.
///
/// Charges are keyed by booking. Concurrent or repeated charges for one
/// booking share a single authorization and all get its receipt.
pub struct SimulatedGateway {
    latency: Duration,
    charges: AtomicUsize,
    outages: AtomicUsize,
    settled: Mutex<HashMap<Uuid, Arc<OnceCell<PaymentReceipt>>>>,
}

impl SimulatedGateway {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            charges: AtomicUsize::new(0),
            outages: AtomicUsize::new(0),
            settled: Mutex::new(HashMap::new()),
        }
    }

    /// Money actually moved so far. Replays do not count.
    pub fn charges(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Make the next `n` authorizations fail with `GatewayUnavailable`.
    pub fn fail_next(&self, n: usize) {
        self.outages.store(n, Ordering::SeqCst);
    }

    fn take_outage(&self) -> bool {
        self.outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn slot(&self, booking_id: Uuid) -> Arc<OnceCell<PaymentReceipt>> {
        let mut settled = self.settled.lock().unwrap_or_else(PoisonError::into_inner);
        settled.entry(booking_id).or_default().clone()
    }

    async fn authorize(&self, job: &PaymentJob) -> CoreResult<PaymentReceipt> {
        tokio::time::sleep(self.latency).await;

        if self.take_outage() {
            return Err(CoreError::GatewayUnavailable(
                "simulated gateway timeout".to_string(),
            ));
        }

        let number = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(booking_id = %job.booking_id, amount = %job.amount, "Charge approved");
        Ok(PaymentReceipt {
            reference: format!("sim_pay_{}_{}", job.booking_id.simple(), number),
            booking_id: job.booking_id,
            amount: job.amount,
            status: PaymentStatus::Succeeded,
            processed_at: chrono::Utc::now(),
        })
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, job: &PaymentJob) -> CoreResult<PaymentReceipt> {
        let slot = self.slot(job.booking_id);
        if let Some(receipt) = slot.get() {
            debug!(booking_id = %job.booking_id, reference = %receipt.reference, "Charge replayed");
            return Ok(receipt.clone());
        }

        // A failed authorization leaves the cell empty for the next caller.
        let receipt = slot.get_or_try_init(|| self.authorize(job)).await?;
        Ok(receipt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_charge_approves_full_amount() {
        let gateway = SimulatedGateway::new(Duration::ZERO);
        let job = PaymentJob::new(Uuid::new_v4(), Decimal::new(6000, 2));

        let receipt = gateway.charge(&job).await.unwrap();
        assert_eq!(receipt.status, PaymentStatus::Succeeded);
        assert_eq!(receipt.booking_id, job.booking_id);
        assert_eq!(receipt.amount, job.amount);
        assert_eq!(gateway.charges(), 1);
    }

    #[tokio::test]
    async fn test_injected_outages() {
        let gateway = SimulatedGateway::new(Duration::ZERO);
        let job = PaymentJob::new(Uuid::new_v4(), Decimal::ONE);
        gateway.fail_next(2);

        assert!(matches!(gateway.charge(&job).await, Err(CoreError::GatewayUnavailable(_))));
        assert!(matches!(gateway.charge(&job).await, Err(CoreError::GatewayUnavailable(_))));
        assert!(gateway.charge(&job).await.is_ok());
        assert_eq!(gateway.charges(), 1);
    }

    #[tokio::test]
    async fn test_repeated_charge_returns_first_receipt() {
        let gateway = SimulatedGateway::new(Duration::ZERO);
        let booking_id = Uuid::new_v4();

        let first = gateway.charge(&PaymentJob::new(booking_id, Decimal::TEN)).await.unwrap();
        let again = gateway.charge(&PaymentJob::new(booking_id, Decimal::TEN)).await.unwrap();
        assert_eq!(first.reference, again.reference);
        assert_eq!(gateway.charges(), 1);

        gateway.charge(&PaymentJob::new(Uuid::new_v4(), Decimal::TEN)).await.unwrap();
        assert_eq!(gateway.charges(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_charges_for_one_booking_move_money_once() {
        let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(50)));
        let job = PaymentJob::new(Uuid::new_v4(), Decimal::new(4500, 2));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..4 {
            let gateway = gateway.clone();
            let job = job.clone();
            tasks.spawn(async move { gateway.charge(&job).await });
        }

        let mut references = Vec::new();
        while let Some(result) = tasks.join_next().await {
            references.push(result.unwrap().unwrap().reference);
        }
        references.dedup();
        assert_eq!(references.len(), 1);
        assert_eq!(gateway.charges(), 1);
    }
}
