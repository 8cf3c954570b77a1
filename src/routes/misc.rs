use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{auth::repo::User, errors::ApiError, state::AppState};

pub const IOS_VERSION: &str = "0.0.1";
pub const ANDROID_VERSION: &str = "0.0.1";

#[derive(Debug, Deserialize)]
pub struct CheckEmailQuery {
    #[serde(default)]
    pub email: Option<String>,
}

/// Account lookup. Both outcomes are 200; the body says which.
pub async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<CheckEmailQuery>,
) -> Result<Json<Value>, ApiError> {
    let exists = match query.email.as_deref().filter(|e| !e.is_empty()) {
        Some(email) => User::find_by_email(&state.db, email).await?.is_some(),
        None => false,
    };
    let body = if exists { "exists" } else { "does not exist" };
    Ok(Json(json!({ "email": body })))
}

pub async fn version_ios() -> Json<Value> {
    Json(json!({ "version": IOS_VERSION }))
}

pub async fn version_android() -> Json<Value> {
    Json(json!({ "version": ANDROID_VERSION }))
}
