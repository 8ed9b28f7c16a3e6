//! Maintenance-mode tracking.
//!
//! The backend exposes a server-wide maintenance switch in its public settings.
//! [`MaintenancePoller`] reads it once on start and then on a fixed period,
//! feeding the result into the [`AuthMachine`]. Failed reads are classified:
//! an unreachable or unavailable backend counts as maintenance, an auth failure
//! explicitly does not, anything else leaves the flag alone.

use crate::{
    api::{ApiClient, ApiError},
    auth::AuthMachine,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, warn};

pub const SETTINGS_PATH: &str = "/system/settings";
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Public system settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    #[serde(default)]
    pub maintenance_mode: Option<bool>,
    #[serde(default)]
    pub max_image_size_mb: Option<u64>,
    #[serde(default)]
    pub max_video_size_mb: Option<u64>,
    #[serde(default)]
    pub primary_engine: Option<String>,
    #[serde(default)]
    pub min_confidence: Option<u64>,
    #[serde(default)]
    pub allowed_file_types: Vec<String>,
}

/// Fetches the public settings.
///
/// # Errors
/// Returns the normalized API failure.
pub async fn fetch_settings(client: &ApiClient) -> Result<SystemSettings, ApiError> {
    client.get(SETTINGS_PATH).await
}

/// Maintenance flag implied by a failed settings read, `None` to keep it.
#[must_use]
pub fn classify_settings_error(err: &ApiError) -> Option<bool> {
    match err {
        ApiError::Transport(_) | ApiError::Timeout | ApiError::Maintenance(_) => Some(true),
        ApiError::SessionInvalid => Some(false),
        ApiError::Business { status: 503, .. } => Some(true),
        ApiError::Business { status: 401, .. } => Some(false),
        other => {
            let message = other.to_string().to_lowercase();
            if message.contains("maintenance") {
                Some(true)
            } else if message.contains("session expired") {
                Some(false)
            } else {
                None
            }
        }
    }
}

/// Performs one settings read and applies it. Returns the resulting flag.
pub async fn refresh_once(client: &ApiClient, machine: &AuthMachine) -> bool {
    match fetch_settings(client).await {
        Ok(settings) => match settings.maintenance_mode {
            Some(enabled) => {
                machine.set_maintenance_mode(enabled);
            }
            None => debug!("settings carry no maintenance flag"),
        },
        Err(err) => match classify_settings_error(&err) {
            Some(enabled) => {
                debug!(enabled, "settings read failed: {err}");
                machine.set_maintenance_mode(enabled);
            }
            None => warn!("failed to read system settings: {err}"),
        },
    }
    machine.maintenance_mode()
}

/// Background settings poller. Dropping it stops the task.
#[derive(Debug)]
pub struct MaintenancePoller {
    handle: JoinHandle<()>,
}

impl MaintenancePoller {
    /// Reads the settings immediately, then every `period`.
    #[must_use]
    pub fn spawn(client: ApiClient, machine: Arc<AuthMachine>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                refresh_once(&client, &machine).await;
            }
        });
        debug!(?period, "maintenance poller started");
        Self { handle }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        self.handle.abort();
        debug!("maintenance poller stopped");
    }
}

impl Drop for MaintenancePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
