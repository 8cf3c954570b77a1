use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ApiError, FieldErrors};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Flat form body shared by the credential endpoints:
/// `user[email]`, `user[password]`, `token`, plus the optional profile
/// fields accepted on registration. Every field is optional at the decoding
/// layer; handlers decide which ones are required.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    #[serde(rename = "user[email]", default)]
    pub email: Option<String>,
    #[serde(rename = "user[password]", default)]
    pub password: Option<String>,
    #[serde(rename = "user[fname]", default)]
    pub fname: Option<String>,
    #[serde(rename = "user[lname]", default)]
    pub lname: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl CredentialsForm {
    /// A body that does not decode is treated as one with no fields, so the
    /// blank-field validation below produces the error response.
    pub fn parse(body: &str) -> Self {
        serde_urlencoded::from_str(body).unwrap_or_default()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Both credentials, or a 400 listing each blank field.
    pub fn require_credentials(&self) -> Result<(&str, &str), ApiError> {
        let mut errors = FieldErrors::new();
        if self.email().is_none() {
            errors.insert("email", vec!["cannot be blank".to_string()]);
        }
        if self.password().is_none() {
            errors.insert("password", vec!["cannot be blank".to_string()]);
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }
        Ok((
            self.email().unwrap_or_default(),
            self.password().unwrap_or_default(),
        ))
    }
}

/// Authenticated-user payload, the only place the bearer token is exposed.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub fname: Option<String>,
    pub lname: Option<String>,
    pub token: String,
}

/// Public part of the user returned on registration (no token yet).
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub fname: Option<String>,
    pub lname: Option<String>,
}
