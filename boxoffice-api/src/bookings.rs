use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use boxoffice_booking::BookingOutcome;
use boxoffice_shared::{Booking, CreateBookingRequest};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Payment job is on the queue.
    Queued,
    /// Queue was unreachable; call the payment retry endpoint or let the
    /// booking expire.
    Deferred,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: Booking,
    pub payment_state: PaymentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<BookingOutcome> for BookingResponse {
    fn from(outcome: BookingOutcome) -> Self {
        match outcome {
            BookingOutcome::Created(booking) => BookingResponse {
                booking,
                payment_state: PaymentState::Queued,
                warning: None,
            },
            BookingOutcome::PaymentDeferred { booking, reason } => BookingResponse {
                booking,
                payment_state: PaymentState::Deferred,
                warning: Some(format!("payment not queued: {}", reason)),
            },
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/bookings", post(create_booking))
        .route("/api/v1/bookings/{id}", get(get_booking))
        .route("/api/v1/bookings/{id}/cancel", put(cancel_booking))
        .route("/api/v1/bookings/{id}/payment", post(retry_payment))
        .route("/api/v1/bookings/user/{user_id}", get(list_user_bookings))
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::ValidationError(format!("{} is not a valid id: {}", field, raw)))
}

/// POST /api/v1/bookings
/// 201 when the payment job is queued, 202 when only the booking was saved.
pub async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let Json(req) = payload?;
    let user_id = parse_id("user_id", &req.user_id)?;
    let event_id = parse_id("event_id", &req.event_id)?;

    let outcome = state
        .bookings
        .create_booking(user_id, event_id, req.quantity)
        .await?;

    let status = if outcome.is_degraded() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.into())))
}

/// GET /api/v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(id) = path?;
    Ok(Json(state.bookings.get_booking(id).await?))
}

/// PUT /api/v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(id) = path?;
    Ok(Json(state.bookings.cancel_booking(id).await?))
}

/// POST /api/v1/bookings/{id}/payment
/// Queue the payment of a Pending booking again.
pub async fn retry_payment(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let Path(id) = path?;
    let booking = state.bookings.retry_payment(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(BookingResponse {
            booking,
            payment_state: PaymentState::Queued,
            warning: None,
        }),
    ))
}

/// GET /api/v1/bookings/user/{user_id}
pub async fn list_user_bookings(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let Path(user_id) = path?;
    Ok(Json(state.bookings.user_bookings(user_id).await?))
}
