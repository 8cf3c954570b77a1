use axum::{routing::get, Router};

use crate::state::AppState;

pub mod health;
pub mod misc;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/check_email", get(misc::check_email))
        .route("/version/ios", get(misc::version_ios))
        .route("/version/android", get(misc::version_android))
}
