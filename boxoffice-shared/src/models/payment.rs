use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message asking the payment worker to settle one booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentJob {
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub enqueued_at: DateTime<Utc>,
}

impl PaymentJob {
    pub fn new(booking_id: Uuid, amount: Decimal) -> Self {
        Self {
            booking_id,
            amount,
            enqueued_at: Utc::now(),
        }
    }
}
