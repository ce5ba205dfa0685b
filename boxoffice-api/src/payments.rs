use axum::{extract::State, routing::get, Json, Router};
use boxoffice_core::queue::QueueDepth;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentStatus {
    pub pending_bookings: usize,
    /// Deadline of the Pending booking that expires first.
    pub next_deadline: Option<DateTime<Utc>>,
    pub queue: QueueDepth,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/payments/status", get(payment_status))
}

/// GET /api/v1/payments/status
pub async fn payment_status(
    State(state): State<AppState>,
) -> Result<Json<PaymentStatus>, AppError> {
    let pending = state.bookings.pending_bookings().await?;
    let queue = state.bookings.payment_backlog().await?;
    if queue.dead > 0 {
        tracing::warn!(dead = queue.dead, "Payment jobs waiting in dead letters");
    }

    Ok(Json(PaymentStatus {
        pending_bookings: pending.len(),
        next_deadline: pending.first().and_then(|b| b.payment_deadline),
        queue,
    }))
}
