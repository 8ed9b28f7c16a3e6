use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Authenticated user as returned by the backend.
///
/// Only `id`, `email` and `is_admin` are interpreted; any other field is kept in
/// `extra` and written back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub is_admin: bool,
    #[serde(default)]
    pub mfa_enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: None,
            is_admin: false,
            mfa_enabled: false,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// Backends have sent `is_admin` as a bool, a 0/1 integer and a string.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(value) => value,
        Value::Number(value) => value.as_f64().is_some_and(|n| n != 0.0),
        Value::String(value) => !value.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    User,
    Admin,
}

impl Role {
    /// Role of the current user; never stored.
    #[must_use]
    pub fn of(user: Option<&User>) -> Self {
        match user {
            Some(user) if user.is_admin => Self::Admin,
            Some(_) => Self::User,
            None => Self::Guest,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// Position in the login flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStep {
    #[default]
    Idle,
    EmailOtp,
    Mfa,
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::EmailOtp => "email-otp",
            Self::Mfa => "mfa",
        };
        f.write_str(name)
    }
}

/// Credentials staged between the password step and login completion.
#[derive(Clone, PartialEq)]
pub struct PendingLogin {
    pub user: User,
    pub token: Option<String>,
    pub mfa_required: bool,
    pub mfa_token: Option<String>,
}

impl fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLogin")
            .field("user", &self.user.email)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("mfa_required", &self.mfa_required)
            .field("mfa_token", &self.mfa_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Body of `/auth/login`, `/auth/verify-mfa` and `/auth/verify-mfa-recovery`.
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub requires_mfa: bool,
    #[serde(default)]
    pub mfa_required: bool,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl TokenResponse {
    /// Older backends only set `requires_mfa`, newer ones set both.
    #[must_use]
    pub const fn needs_mfa(&self) -> bool {
        self.mfa_required || self.requires_mfa
    }

    /// Access token, `None` when the backend sent an empty one.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        non_empty(&self.access_token)
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("mfa_required", &self.needs_mfa())
            .field("user", &self.user.as_ref().map(|u| &u.email))
            .finish_non_exhaustive()
    }
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Body of `/auth/verify-password-reset-otp`.
#[derive(Clone, Default, Deserialize)]
pub struct ResetTokenResponse {
    #[serde(default)]
    pub message: String,
    pub reset_token: String,
}

impl fmt::Debug for ResetTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetTokenResponse")
            .field("message", &self.message)
            .field("reset_token", &"***")
            .finish()
    }
}

/// Body of `/auth/enable-mfa`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MfaEnrollment {
    pub secret: String,
    pub qr_code_uri: String,
    #[serde(default)]
    pub backup_codes: Vec<String>,
}

/// Kind of one-time code for `/auth/resend-otp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpKind {
    Login,
    ForgotPassword,
    MfaRecovery,
}

/// Empty strings count as absent credentials.
#[must_use]
pub fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
