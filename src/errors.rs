use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Field-keyed error messages, serialized as `{"field": ["message", ...]}`.
/// BTreeMap keeps response bodies deterministic.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input, including reset-token state errors.
    #[error("validation failed")]
    Validation(FieldErrors),
    /// Unknown account. Deliberately uninformative: empty body.
    #[error("not found")]
    NotFound,
    /// Wrong password for a known account.
    #[error("unauthorized")]
    Unauthorized(FieldErrors),
    /// Rejected by the abuse throttle before reaching any handler.
    #[error("throttled")]
    Throttled,
    /// Storage or collaborator failure. Logged, never leaked to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(BTreeMap::from([(field, vec![message.into()])]))
    }

    pub fn unauthorized(field: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized(BTreeMap::from([(field, vec![message.into()])]))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Unauthorized(errors) => {
                (StatusCode::UNAUTHORIZED, Json(errors)).into_response()
            }
            Self::Throttled => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "throttled" })),
            )
                .into_response(),
            Self::Internal(err) => {
                error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn validation_maps_to_400_with_field_errors() {
        let err = ApiError::validation("email", "cannot be blank");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "email": ["cannot be blank"] })
        );
    }

    #[tokio::test]
    async fn not_found_has_empty_body() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_401() {
        let err = ApiError::unauthorized("password", "is incorrect");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "password": ["is incorrect"] })
        );
    }

    #[tokio::test]
    async fn throttled_maps_to_429() {
        let response = ApiError::Throttled.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(response).await, json!({ "error": "throttled" }));
    }

    #[tokio::test]
    async fn internal_hides_the_cause() {
        let response = ApiError::Internal(anyhow::anyhow!("pool exhausted")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "internal server error" }));
    }
}
