//! Signed-in user endpoints: statistics, password change, media detection and
//! upload management.

use crate::api::{ApiClient, ApiError};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::{debug, instrument};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Image => "/detect/image",
            Self::Video => "/detect/video",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub annotated_path: Option<String>,
    #[serde(default)]
    pub detection_summary: Option<Map<String, Value>>,
    #[serde(default)]
    pub is_processed: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub processed_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub total_uploads: u64,
    #[serde(default)]
    pub total_detections: u64,
    #[serde(default)]
    pub dangerous_detections: u64,
    #[serde(default)]
    pub image_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub live_count: u64,
    #[serde(default)]
    pub dangerous_alerts: u64,
    #[serde(default)]
    pub active_cameras: u64,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub recent_uploads: Vec<Upload>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// Backends report this as text ("87.5%") or as a number.
    pub confidence: Value,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub threat_level: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub upload_id: String,
    pub filename: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub summary: Map<String, Value>,
    #[serde(default)]
    pub annotated_url: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DetectionResponse {
    /// Detections the backend flagged as dangerous.
    pub fn dangerous(&self) -> impl Iterator<Item = &Detection> {
        self.detections
            .iter()
            .filter(|d| d.threat_level.eq_ignore_ascii_case("dangerous"))
    }
}

/// # Errors
/// Returns the normalized API failure.
pub async fn stats(client: &ApiClient) -> Result<UserStats, ApiError> {
    client.get("/user/stats").await
}

/// # Errors
/// Returns the normalized API failure.
#[instrument(skip_all)]
pub async fn change_password(
    client: &ApiClient,
    current_password: &SecretString,
    new_password: &SecretString,
) -> Result<Value, ApiError> {
    let body = json!({
        "current_password": current_password.expose_secret(),
        "new_password": new_password.expose_secret(),
    });
    client.post("/user/change-password", &body).await
}

/// Uploads in-memory media for detection.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn detect_bytes(
    client: &ApiClient,
    kind: MediaKind,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<DetectionResponse, ApiError> {
    let part = Part::bytes(bytes).file_name(filename.to_string());
    let form = Form::new().part("file", part);
    debug!(filename, endpoint = kind.endpoint(), "uploading media");
    client.upload(kind.endpoint(), form).await
}

/// Reads a media file from disk and uploads it for detection.
///
/// # Errors
/// Returns [`ApiError::Request`] if the file cannot be read, otherwise the
/// normalized API failure.
pub async fn detect_file(
    client: &ApiClient,
    kind: MediaKind,
    path: &Path,
) -> Result<DetectionResponse, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| ApiError::Request(format!("{}: {err}", path.display())))?;
    let filename = path
        .file_name()
        .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());
    detect_bytes(client, kind, &filename, bytes).await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn get_upload(client: &ApiClient, upload_id: &str) -> Result<Upload, ApiError> {
    client.get(&format!("/uploads/{upload_id}")).await
}

/// # Errors
/// Returns the normalized API failure.
pub async fn delete_upload(client: &ApiClient, upload_id: &str) -> Result<Value, ApiError> {
    client.delete(&format!("/uploads/{upload_id}")).await
}
