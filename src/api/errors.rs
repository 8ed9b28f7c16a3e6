//! Error taxonomy for backend calls and the rules that map a failed HTTP
//! response onto it.

use regex::RegexSet;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum number of characters of a backend message surfaced to users.
pub const MAX_ERROR_CHARS: usize = 200;
/// Message used when a failed JSON call carries no usable `detail`.
pub const REQUEST_FAILED: &str = "Request failed";
/// Message used when a failed upload carries no usable `detail`.
pub const UPLOAD_FAILED: &str = "Upload failed";

// 401 responses with one of these details are ordinary business errors
// (wrong password, bad code) and must not drop the session.
const BUSINESS_UNAUTHORIZED: [&str; 5] = [
    r"^Invalid password$",
    r"^Invalid credentials$",
    r"Invalid MFA",
    r"Invalid or expired session",
    r"session expired",
];

static BUSINESS_UNAUTHORIZED_SET: LazyLock<Option<RegexSet>> =
    LazyLock::new(|| RegexSet::new(BUSINESS_UNAUTHORIZED).ok());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-2xx response that callers show to the user; the session is kept.
    #[error("{message}")]
    Business { status: u16, message: String },
    /// The bearer token was rejected; the session has already been cleared.
    #[error("Session expired")]
    SessionInvalid,
    #[error("{0}")]
    Maintenance(String),
    #[error("Unable to reach the server: {0}")]
    Transport(String),
    #[error("Request timed out. Please try again.")]
    Timeout,
    #[error("Failed to decode response: {0}")]
    Parse(String),
    #[error("Failed to build request: {0}")]
    Request(String),
}

impl ApiError {
    /// HTTP status of the failed response, when there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Business { status, .. } => Some(*status),
            Self::SessionInvalid => Some(401),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid)
    }

    #[must_use]
    pub const fn is_maintenance(&self) -> bool {
        matches!(self, Self::Maintenance(_))
    }
}

/// Extracts a human-readable message from a FastAPI-style error body.
///
/// `detail` may be a string, a list of validation errors carrying `msg`, or any
/// other JSON value. An empty string counts as missing.
#[must_use]
pub fn detail_message(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::Null => None,
        Value::String(detail) if detail.is_empty() => None,
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item.get("msg") {
                    Some(Value::String(msg)) => msg.clone(),
                    Some(other) => other.to_string(),
                    None => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// True when a 401 detail names a business failure rather than a bad token.
#[must_use]
pub fn is_business_unauthorized(detail: Option<&str>) -> bool {
    let Some(detail) = detail else {
        return false;
    };
    BUSINESS_UNAUTHORIZED_SET
        .as_ref()
        .is_some_and(|set| set.is_match(detail))
}

/// Maps a failed response onto an [`ApiError`].
///
/// Status codes win over message text: 401 is checked first, then 503, and the
/// `maintenance` substring is only a fallback for backends that report it with
/// another status.
#[must_use]
pub fn classify_failure(status: u16, detail: Option<String>, fallback: &str) -> ApiError {
    if status == 401 && !is_business_unauthorized(detail.as_deref()) {
        return ApiError::SessionInvalid;
    }

    let message = sanitize_message(detail.as_deref().unwrap_or(fallback), fallback);

    if status == 503 || message.to_lowercase().contains("maintenance") {
        return ApiError::Maintenance(message);
    }

    ApiError::Business { status, message }
}

/// Trims and truncates a message for display.
#[must_use]
pub fn sanitize_message(message: &str, fallback: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
