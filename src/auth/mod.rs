use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
