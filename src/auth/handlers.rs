use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginForm, TokenResponse},
        services,
    },
    error::ApiError,
    state::AppState,
    users::{
        self,
        dto::{MessageResponse, UserCreate, UserResponse},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/verify-email/:user_id/:token", get(verify_email))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<UserCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(payload) = payload?;
    let user = users::services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Form(form) = form?;
    let token = services::login(&state, &form.username, &form.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[instrument(skip(state, path))]
pub async fn verify_email(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, String)>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path((user_id, token)) = path?;
    users::services::verify_email(&state, user_id, &token).await?;
    Ok(Json(MessageResponse {
        message: "Email verified successfully".into(),
    }))
}
