use axum::{extract::State, http::StatusCode};
use tracing::{info, instrument, warn};

use crate::{
    auth::{dto::CredentialsForm, password, repo::User, token},
    errors::{ApiError, FieldErrors},
    reset::service,
    state::AppState,
};

/// Start (or restart) a password reset. A new token replaces any pending
/// one, so only the most recent request can be confirmed. The token is
/// committed before the notifier sees it and never appears in the response.
#[instrument(skip(state, body))]
pub async fn request_reset(
    State(state): State<AppState>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let form = CredentialsForm::parse(&body);
    let email = form
        .email()
        .ok_or_else(|| ApiError::validation("email", "is required"))?;

    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or(ApiError::NotFound)?;

    let reset_token = token::generate();
    User::set_reset_token(&state.db, user.id, &reset_token, state.clock.now()).await?;
    state.notifier.deliver(&user.email, &reset_token).await?;

    info!(user_id = %user.id, "password reset requested");
    Ok(StatusCode::OK)
}

/// Consume a pending reset: on success the password hash is replaced and the
/// pending state cleared in one statement. Every refusal leaves the stored
/// state exactly as it was.
#[instrument(skip(state, body))]
pub async fn update_password(
    State(state): State<AppState>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let form = CredentialsForm::parse(&body);

    let mut errors = FieldErrors::new();
    if form.email().is_none() {
        errors.insert("email", vec!["is required".to_string()]);
    }
    if form.password().is_none() {
        errors.insert("password", vec!["is required".to_string()]);
    }
    if form.token().is_none() {
        errors.insert("token", vec!["is required".to_string()]);
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let email = form.email().unwrap_or_default();
    let new_password = form.password().unwrap_or_default();
    let submitted_token = form.token().unwrap_or_default();

    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or(ApiError::NotFound)?;

    let pending = user.reset_token.as_deref().zip(user.reset_sent_at);
    service::check_pending(
        pending,
        submitted_token,
        state.clock.now(),
        state.config.reset_token_ttl(),
    )
    .map_err(|denial| {
        warn!(user_id = %user.id, reason = denial.message(), "reset confirmation refused");
        ApiError::validation("token", denial.message())
    })?;

    let hash =
        password::hash_blocking(new_password.to_string(), state.config.hash_timeout()).await?;
    User::complete_reset(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset completed");
    Ok(StatusCode::OK)
}
