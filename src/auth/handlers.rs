use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{is_valid_email, AuthenticatedUser, CredentialsForm, PublicUser},
        events::AuthEvent,
        password, token,
        repo::User,
    },
    errors::ApiError,
    net::ClientIp,
    state::AppState,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The credential endpoint accepts exactly one content type; anything else
/// is a 400 naming the expected one.
pub(crate) fn require_form_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    match content_type {
        Some(ct) if ct == FORM_CONTENT_TYPE => Ok(()),
        other => {
            let mut messages = vec![format!("must be {FORM_CONTENT_TYPE}")];
            match other {
                Some(got) => messages.push(format!("cannot be {got}")),
                None => messages.push("cannot be nil".to_string()),
            }
            Err(ApiError::Validation(std::collections::BTreeMap::from([(
                "content_type",
                messages,
            )])))
        }
    }
}

/// Email/password login. Issues the bearer token on first success and
/// returns the same token on every later one; every verified attempt lands
/// in the audit log before the response goes out.
#[instrument(skip(state, body))]
pub async fn authenticate(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: String,
) -> Result<Json<AuthenticatedUser>, ApiError> {
    require_form_content_type(&headers)?;

    let form = CredentialsForm::parse(&body);
    let (email, submitted_password) = form.require_credentials()?;

    // Unknown email: nothing to audit, the attempt never touched an account.
    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or(ApiError::NotFound)?;

    let ok = password::verify_blocking(
        submitted_password.to_string(),
        user.password_hash.clone(),
        state.config.hash_timeout(),
    )
    .await?;

    if !ok {
        AuthEvent::record(&state.db, user.id, ip, false).await?;
        warn!(user_id = %user.id, %ip, "authentication failed");
        return Err(ApiError::unauthorized("password", "is incorrect"));
    }

    AuthEvent::record(&state.db, user.id, ip, true).await?;

    let bearer = match user.token.clone() {
        Some(existing) => existing,
        None => {
            let fresh = token::generate();
            User::assign_token(&state.db, user.id, &fresh).await?;
            fresh
        }
    };

    info!(user_id = %user.id, "authenticated");
    Ok(Json(AuthenticatedUser {
        id: user.id,
        email: user.email,
        fname: user.fname,
        lname: user.lname,
        token: bearer,
    }))
}

/// Account creation. No bearer token is issued here; the first successful
/// authentication does that.
#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<PublicUser>, ApiError> {
    require_form_content_type(&headers)?;

    let form = CredentialsForm::parse(&body);
    let (email, password) = form.require_credentials()?;

    if !is_valid_email(email) {
        return Err(ApiError::validation("email", "is invalid"));
    }
    if password.len() < 8 {
        return Err(ApiError::validation("password", "is too short"));
    }
    if User::find_by_email(&state.db, email).await?.is_some() {
        warn!(%email, "registration for taken email");
        return Err(ApiError::validation("email", "has already been taken"));
    }

    let hash = password::hash_blocking(password.to_string(), state.config.hash_timeout()).await?;
    let user = User::create(
        &state.db,
        email,
        &hash,
        form.fname.as_deref(),
        form.lname.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, "user registered");
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
        fname: user.fname,
        lname: user.lname,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_form_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, FORM_CONTENT_TYPE.parse().unwrap());
        assert!(require_form_content_type(&headers).is_ok());
    }

    #[test]
    fn rejects_other_content_types_naming_both() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let err = require_form_content_type(&headers).unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(
                    errors["content_type"],
                    vec![
                        "must be application/x-www-form-urlencoded",
                        "cannot be application/json"
                    ]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_a_missing_content_type() {
        let err = require_form_content_type(&HeaderMap::new()).unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(
                    errors["content_type"],
                    vec![
                        "must be application/x-www-form-urlencoded",
                        "cannot be nil"
                    ]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_form_content_type_with_parameters() {
        // exact match only, charset parameters included
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=UTF-8".parse().unwrap(),
        );
        assert!(require_form_content_type(&headers).is_err());
    }
}
