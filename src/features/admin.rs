//! Administrator endpoints. Responses stay loosely typed (`serde_json::Value`)
//! where the console only displays them.

use crate::api::{ApiClient, ApiError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub skip: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

impl Page {
    fn query(self) -> Vec<(&'static str, String)> {
        vec![("skip", self.skip.to_string()), ("limit", self.limit.to_string())]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Reviewed,
    Acknowledged,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AlertUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AlertStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
}

/// Filters for the audit log listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub action: Option<String>,
}

/// # Errors
/// Returns the normalized API failure.
pub async fn stats(client: &ApiClient) -> Result<Value, ApiError> {
    client.get("/admin/stats").await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn system_health(client: &ApiClient) -> Result<Value, ApiError> {
    client.get("/admin/system/health").await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn list_users(client: &ApiClient, page: Page) -> Result<Vec<Value>, ApiError> {
    client.get_with_query("/admin/users", &page.query()).await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn get_user(client: &ApiClient, user_id: &str) -> Result<Value, ApiError> {
    client.get(&format!("/admin/users/{user_id}")).await
}

/// Creates a user; without a password the backend emails an invite.
///
/// # Errors
/// Returns the normalized API failure.
#[instrument(skip(client, password))]
pub async fn create_user(
    client: &ApiClient,
    name: &str,
    email: &str,
    password: Option<&SecretString>,
    admin: bool,
) -> Result<Value, ApiError> {
    let body = json!({
        "name": name,
        "email": email,
        "password": password.map(|p| p.expose_secret()),
        "role": if admin { "admin" } else { "user" },
        "is_active": true,
    });
    client.post("/admin/users", &body).await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn update_user(
    client: &ApiClient,
    user_id: &str,
    changes: &Map<String, Value>,
) -> Result<Value, ApiError> {
    client.put(&format!("/admin/users/{user_id}"), changes).await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn delete_user(client: &ApiClient, user_id: &str) -> Result<Value, ApiError> {
    client.delete(&format!("/admin/users/{user_id}")).await
}

/// Revokes every session of a user.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn force_logout(client: &ApiClient, user_id: &str) -> Result<Value, ApiError> {
    client
        .post_empty(&format!("/admin/users/{user_id}/logout"))
        .await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn reset_mfa(client: &ApiClient, user_id: &str) -> Result<Value, ApiError> {
    client
        .post_empty(&format!("/admin/users/{user_id}/reset-mfa"))
        .await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn list_uploads(
    client: &ApiClient,
    page: Page,
    user_id: Option<&str>,
) -> Result<Vec<Value>, ApiError> {
    let mut query = page.query();
    if let Some(user_id) = user_id {
        query.push(("user_id", user_id.to_string()));
    }
    client.get_with_query("/admin/uploads", &query).await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn delete_upload(client: &ApiClient, upload_id: &str) -> Result<Value, ApiError> {
    client.delete(&format!("/admin/uploads/{upload_id}")).await
}

/// Runs detection again on a stored upload.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn reprocess_upload(client: &ApiClient, upload_id: &str) -> Result<Value, ApiError> {
    client
        .post_empty(&format!("/admin/reprocess/{upload_id}"))
        .await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn list_alerts(
    client: &ApiClient,
    page: Page,
    user_id: Option<&str>,
) -> Result<Vec<Value>, ApiError> {
    let mut query = page.query();
    if let Some(user_id) = user_id {
        query.push(("user_id", user_id.to_string()));
    }
    client.get_with_query("/admin/alerts", &query).await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn update_alert(
    client: &ApiClient,
    alert_id: &str,
    update: &AlertUpdate,
) -> Result<Value, ApiError> {
    client
        .patch(&format!("/admin/alerts/{alert_id}"), update)
        .await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn list_audit_logs(
    client: &ApiClient,
    page: Page,
    filter: &AuditFilter,
) -> Result<Value, ApiError> {
    let mut query = page.query();
    if let Some(user_id) = &filter.user_id {
        query.push(("user_id", user_id.clone()));
    }
    if let Some(action) = &filter.action {
        query.push(("action", action.clone()));
    }
    client.get_with_query("/admin/audit-logs", &query).await
}

/// Alerts as CSV.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn export_alerts(client: &ApiClient) -> Result<String, ApiError> {
    client.get_text("/admin/export/alerts", &[]).await
}

/// Audit logs as CSV, optionally restricted to the given entry ids.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn export_audit_logs(client: &ApiClient, ids: &[String]) -> Result<String, ApiError> {
    let query = if ids.is_empty() {
        Vec::new()
    } else {
        vec![("ids", ids.join(","))]
    };
    client.get_text("/admin/export/audit-logs", &query).await
}

/// Full system settings, including fields hidden from regular users.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn settings(client: &ApiClient) -> Result<Value, ApiError> {
    client.get("/admin/settings").await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn update_settings(
    client: &ApiClient,
    settings: &Map<String, Value>,
) -> Result<Value, ApiError> {
    client.put("/admin/settings", settings).await
}
