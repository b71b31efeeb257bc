use serde::{Deserialize, Serialize};
use std::fmt;

use super::Timestamp;

/// Account record owned by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Opaque server identifier.
    pub id: String,

    /// Login email address.
    pub email: String,

    /// Display name.
    pub full_name: String,

    /// Whether the account may sign in.
    pub is_active: bool,

    /// When the account was created.
    pub created_at: Timestamp,

    /// When the account was last modified.
    pub updated_at: Timestamp,
}

impl User {
    /// Up to two upper-case initials taken from the display name.
    #[must_use]
    pub fn initials(&self) -> String {
        self.full_name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect()
    }
}

/// Payload for `POST /auth/register`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

impl RegisterRequest {
    /// Credentials used for the login that follows a successful registration.
    #[must_use]
    pub fn credentials(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Email/password credentials.
///
/// `POST /auth/token` takes these form-encoded, with the email sent as
/// `username`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    /// Form fields expected by the token endpoint.
    #[must_use]
    pub fn form_fields(&self) -> [(&'static str, &str); 2] {
        [("username", self.email.as_str()), ("password", self.password.as_str())]
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Response of `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}
