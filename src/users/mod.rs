use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod nickname;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
