use serde::{Deserialize, Serialize};
use std::fmt;

/// The artifact proving an authenticated session: an opaque bearer token.
///
/// The core attaches it to the `Authorization` header of outbound requests
/// and otherwise never looks inside it. Created on successful login or
/// refresh; cleared on logout or unrecoverable refresh failure; rehydrated
/// from secure storage on application reload.
///
/// # Security
///
/// The token must never be logged. The `Debug` implementation redacts it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw bearer token. Handle with care; do not log.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

/// Login request payload.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response of the login and refresh endpoints: a single fresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Password reset request (step 1: ask for a verification code by email).
#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Password reset submission (step 2: verification code plus new password).
#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
    pub verification_code: String,
    pub new_password: String,
}

/// Error payload many backend endpoints return alongside a failure status.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}

/// Portal user roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Admin,
    Leader,
}

/// Account standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

/// Full user profile as returned by the `me` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
    pub user_type: UserType,
    pub user_status: UserStatus,
}

impl UserProfile {
    /// The lean projection kept in memory for UI purposes.
    pub fn to_summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.user_id,
            name: self.name.clone(),
            user_type: self.user_type,
            avatar: self.profile_photo_url.clone(),
        }
    }
}

/// Minimal user projection for session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: i64,
    pub name: String,
    pub user_type: UserType,
    #[serde(default)]
    pub avatar: Option<String>,
}
