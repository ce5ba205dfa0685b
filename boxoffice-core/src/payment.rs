use async_trait::async_trait;
use boxoffice_shared::PaymentJob;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Succeeded,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String, // Provider's ID (e.g., pay_123)
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub processed_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge the amount carried by the job.
    ///
    /// `job.booking_id` is the idempotency key: charging a booking that was
    /// already charged returns the first receipt and moves no money. A
    /// returned receipt is final; an `Err` means the gateway could not be
    /// reached and nothing was charged.
    async fn charge(&self, job: &PaymentJob) -> CoreResult<PaymentReceipt>;
}
