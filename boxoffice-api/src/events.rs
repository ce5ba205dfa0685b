use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use boxoffice_catalog::{new_event, revise_event};
use boxoffice_core::CoreError;
use boxoffice_shared::{CreateEventRequest, Event, EventStatistics, UpdateEventRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/events", get(list_events).post(create_event))
        .route("/api/v1/events/{id}", get(get_event).put(update_event))
        .route("/api/v1/events/{id}/statistics", get(event_statistics))
}

async fn load_event(state: &AppState, id: Uuid) -> Result<Event, AppError> {
    state
        .events
        .get_event(id)
        .await?
        .ok_or_else(|| CoreError::EventNotFound(id).into())
}

/// GET /api/v1/events
pub async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(state.events.list_events().await?))
}

/// POST /api/v1/events
pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let Json(req) = payload?;
    let event = new_event(req)?;
    state.events.create_event(&event).await?;
    tracing::info!(event_id = %event.id, total_tickets = event.total_tickets, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/v1/events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Event>, AppError> {
    let Path(id) = path?;
    Ok(Json(load_event(&state, id).await?))
}

/// PUT /api/v1/events/{id}
/// Capacity cannot be changed; a `total_tickets` field in the body is ignored.
pub async fn update_event(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateEventRequest>, JsonRejection>,
) -> Result<Json<Event>, AppError> {
    let Path(id) = path?;
    let Json(update) = payload?;
    let event = revise_event(load_event(&state, id).await?, update)?;
    state.events.update_event(&event).await?;
    Ok(Json(event))
}

/// GET /api/v1/events/{id}/statistics
pub async fn event_statistics(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EventStatistics>, AppError> {
    let Path(id) = path?;
    let stats = state
        .events
        .event_statistics(id)
        .await?
        .ok_or(CoreError::EventNotFound(id))?;
    Ok(Json(stats))
}
