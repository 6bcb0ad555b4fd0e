use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{jwt::AuthUser, policy::Action},
    error::ApiError,
    state::AppState,
    users::{
        dto::{ListParams, UserCreate, UserListResponse, UserResponse, UserUpdate},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users).post(create_user))
        .route("/users/me", get(get_me).put(update_me))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/upgrade_professional", post(upgrade_professional))
        .route("/users/:id/unlock", post(unlock_user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<UserListResponse>, ApiError> {
    caller.require(Action::ListUsers)?;
    let Query(params) = params?;
    Ok(Json(services::list(&state, params).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    caller: AuthUser,
    payload: Result<Json<UserCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    caller.require(Action::CreateUser)?;
    let Json(payload) = payload?;
    let user = services::create_by_staff(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(Action::ManageOwnProfile)?;
    Ok(Json(services::get(&state, caller.id).await?.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    caller: AuthUser,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(Action::ManageOwnProfile)?;
    let Json(payload) = payload?;
    if payload.role.is_some() {
        warn!(user_id = %caller.id, "attempt to change own role");
        return Err(ApiError::Forbidden("Cannot change your own role".into()));
    }
    Ok(Json(services::update(&state, caller.id, payload).await?.into()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(Action::ReadUser)?;
    let Path(id) = path?;
    Ok(Json(services::get(&state, id).await?.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(Action::UpdateUser)?;
    let Path(id) = path?;
    let Json(payload) = payload?;
    Ok(Json(services::update(&state, id, payload).await?.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    caller.require(Action::DeleteUser)?;
    let Path(id) = path?;
    services::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn upgrade_professional(
    State(state): State<AppState>,
    caller: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(Action::UpgradeProfessional)?;
    let Path(id) = path?;
    Ok(Json(services::upgrade_professional(&state, id).await?.into()))
}

#[instrument(skip(state))]
pub async fn unlock_user(
    State(state): State<AppState>,
    caller: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(Action::UnlockUser)?;
    let Path(id) = path?;
    Ok(Json(services::unlock(&state, id).await?.into()))
}
