use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use boxoffice_catalog::{new_user, revise_user};
use boxoffice_core::CoreError;
use boxoffice_shared::{CreateUserRequest, UpdateUserRequest, User};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", get(list_users).post(create_user))
        .route(
            "/api/v1/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(id).into())
}

/// GET /api/v1/users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list_users().await?))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let Json(req) = payload?;
    let user = new_user(req)?;
    state.users.create_user(&user).await?;
    tracing::info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = path?;
    Ok(Json(load_user(&state, id).await?))
}

/// PUT /api/v1/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = path?;
    let Json(update) = payload?;
    let user = revise_user(load_user(&state, id).await?, update)?;
    state.users.update_user(&user).await?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/{id}
/// Bookings made by the user are kept.
pub async fn delete_user(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    state.users.delete_user(id).await?;
    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
