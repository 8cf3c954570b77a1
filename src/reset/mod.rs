use axum::{
    routing::{post, put},
    Router,
};

use crate::state::AppState;

pub mod handlers;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reset_password", post(handlers::request_reset))
        .route("/update_password", put(handlers::update_password))
}
