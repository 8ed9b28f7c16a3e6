//! Auth endpoint wrappers. Each call is a thin request over [`ApiClient`]; the
//! state machine is driven by [`super::flow::LoginFlow`], not here.

use super::types::{
    MessageResponse, MfaEnrollment, OtpKind, ResetTokenResponse, TokenResponse, User,
};
use crate::api::{ApiClient, ApiError};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::instrument;

/// Password login; may answer with an MFA challenge instead of a token.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client, password))]
pub async fn login(
    client: &ApiClient,
    email: &str,
    password: &SecretString,
) -> Result<TokenResponse, ApiError> {
    let body = json!({ "email": email, "password": password.expose_secret() });
    client.post("/auth/login", &body).await
}

/// Creates an account.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client, password))]
pub async fn register(
    client: &ApiClient,
    name: &str,
    email: &str,
    password: &SecretString,
) -> Result<Value, ApiError> {
    let body = json!({ "name": name, "email": email, "password": password.expose_secret() });
    client.post("/auth/register", &body).await
}

/// Emails a login code to the pending user.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client))]
pub async fn send_email_otp(client: &ApiClient, email: &str) -> Result<MessageResponse, ApiError> {
    client
        .post_anonymous("/auth/send-email-otp", &json!({ "email": email }))
        .await
}

/// Checks the emailed login code.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client, code))]
pub async fn verify_email_otp(client: &ApiClient, email: &str, code: &str) -> Result<Value, ApiError> {
    client
        .post_anonymous(
            "/auth/verify-email-otp",
            &json!({ "email": email, "otp_code": code }),
        )
        .await
}

/// Checks a TOTP code against the MFA challenge token.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip_all)]
pub async fn verify_mfa(
    client: &ApiClient,
    code: &str,
    mfa_token: &str,
) -> Result<TokenResponse, ApiError> {
    client
        .post(
            "/auth/verify-mfa",
            &json!({ "token": code, "mfa_token": mfa_token }),
        )
        .await
}

/// Emails a recovery code for users who lost their authenticator.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip_all)]
pub async fn initiate_mfa_recovery(
    client: &ApiClient,
    mfa_token: &str,
) -> Result<MessageResponse, ApiError> {
    client
        .post(
            "/auth/initiate-mfa-recovery",
            &json!({ "mfa_token": mfa_token }),
        )
        .await
}

/// Completes MFA with an emailed recovery code.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip_all)]
pub async fn verify_mfa_recovery(
    client: &ApiClient,
    mfa_token: &str,
    otp: &str,
) -> Result<TokenResponse, ApiError> {
    client
        .post(
            "/auth/verify-mfa-recovery",
            &json!({ "mfa_token": mfa_token, "otp": otp }),
        )
        .await
}

/// Asks the backend to send a new one-time code.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client))]
pub async fn resend_otp(
    client: &ApiClient,
    email: &str,
    kind: OtpKind,
) -> Result<MessageResponse, ApiError> {
    client
        .post("/auth/resend-otp", &json!({ "email": email, "type": kind }))
        .await
}

/// Starts a password reset by emailing a code.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client))]
pub async fn request_password_reset(
    client: &ApiClient,
    email: &str,
) -> Result<MessageResponse, ApiError> {
    client
        .post("/auth/request-password-reset", &json!({ "email": email }))
        .await
}

/// Exchanges the emailed reset code for a reset token.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client, otp))]
pub async fn verify_password_reset_otp(
    client: &ApiClient,
    email: &str,
    otp: &str,
) -> Result<ResetTokenResponse, ApiError> {
    client
        .post(
            "/auth/verify-password-reset-otp",
            &json!({ "email": email, "otp": otp }),
        )
        .await
}

/// Sets a new password using a reset token.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip_all)]
pub async fn reset_password(
    client: &ApiClient,
    reset_token: &SecretString,
    new_password: &SecretString,
) -> Result<MessageResponse, ApiError> {
    let body = json!({
        "token": reset_token.expose_secret(),
        "new_password": new_password.expose_secret(),
    });
    client.post("/auth/reset-password", &body).await
}

/// Fetches the signed-in user.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn me(client: &ApiClient) -> Result<User, ApiError> {
    client.get("/auth/me").await
}

/// Revokes the server-side session.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn logout(client: &ApiClient) -> Result<MessageResponse, ApiError> {
    client.post_empty("/auth/logout").await
}

/// Updates profile fields and returns the stored user.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn update_profile(client: &ApiClient, changes: &Map<String, Value>) -> Result<Value, ApiError> {
    client.put("/auth/update-profile", changes).await
}

/// Starts TOTP enrollment.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn enable_mfa(client: &ApiClient) -> Result<MfaEnrollment, ApiError> {
    client.post_empty("/auth/enable-mfa").await
}

/// Confirms TOTP enrollment with a first code.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip_all)]
pub async fn confirm_mfa(client: &ApiClient, code: &str) -> Result<Value, ApiError> {
    client
        .post("/auth/confirm-mfa", &json!({ "token": code }))
        .await
}

/// Disables TOTP; the backend asks for the password again.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip_all)]
pub async fn disable_mfa(
    client: &ApiClient,
    password: &SecretString,
) -> Result<MessageResponse, ApiError> {
    client
        .post(
            "/auth/disable-mfa",
            &json!({ "password": password.expose_secret() }),
        )
        .await
}
