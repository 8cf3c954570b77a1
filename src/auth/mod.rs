use axum::{routing::post, Router};

use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod token;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", post(handlers::authenticate))
        .route("/users", post(handlers::register))
}
