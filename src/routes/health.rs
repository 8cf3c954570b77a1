use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use time::format_description::well_known::Rfc3339;

use crate::state::AppState;

/// Liveness probe for load balancers. Each dependency probe is caught into
/// a status string; only a dead credential store degrades the whole
/// response. Nothing escapes this handler.
pub async fn health(State(state): State<AppState>) -> Response {
    let timestamp = state
        .clock
        .now()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::new());

    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected".to_string(),
        Err(err) => format!("error: {err}"),
    };
    let throttle_store = match state.throttle.ping().await {
        Ok(()) => "ok".to_string(),
        Err(err) => format!("error: {err}"),
    };

    if database.starts_with("error") {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "message": database,
                "timestamp": timestamp,
            })),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
            "throttle_store": throttle_store,
            "timestamp": timestamp,
        })),
    )
        .into_response()
}
