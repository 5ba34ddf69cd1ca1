//! User API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use stagehand_core::domain::user::User;
use stagehand_core::dto::user::{RegisterUser, UpdateUser};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /user/register
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    tracing::info!("Registering user: {}", req.email);

    let user = state.service.register_user(&req.email).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /user/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    tracing::debug!("Getting user: {}", id);

    Ok(Json(state.service.get_user(id).await?))
}

/// PUT /user/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUser>,
) -> ApiResult<Json<User>> {
    tracing::info!("Updating user: {}", id);

    Ok(Json(state.service.update_user(id, &req.email).await?))
}
