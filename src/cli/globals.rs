use crate::{
    api::ApiClient,
    auth::{AuthMachine, LoginFlow},
    config::AppConfig,
    routes::{LogNavigator, Navigator},
    session::{FileStorage, SessionStore},
};
use anyhow::{Context as _, Result};
use std::{fmt, path::PathBuf, sync::Arc, time::Duration};
use tracing::debug;

/// Arguments shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    pub api_base_url: String,
    pub state_dir: PathBuf,
    pub timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            state_dir: state_dir.into(),
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// # Errors
    /// Returns an error if the base URL is not a valid http(s) URL.
    pub fn config(&self) -> Result<AppConfig> {
        let config = AppConfig::new(&self.api_base_url, self.state_dir.clone())
            .with_context(|| format!("invalid API base URL: {}", self.api_base_url))?;
        Ok(config.with_request_timeout(self.timeout))
    }

    /// Opens the stored session and builds a client bound to it.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn connect(&self) -> Result<Context> {
        let config = self.config()?;
        let storage = Arc::new(FileStorage::new(&config.state_dir));
        let session = Arc::new(SessionStore::new(storage));
        let machine = Arc::new(AuthMachine::new(session));
        machine.hydrate();

        let navigator: Arc<dyn Navigator> = Arc::new(LogNavigator);
        let client = ApiClient::new(&config, machine.clone(), navigator.clone())?;
        debug!(base_url = client.base_url(), state_dir = %config.state_dir.display(), "client ready");

        Ok(Context {
            config,
            machine,
            client,
            navigator,
        })
    }
}

/// Everything an action needs to talk to the backend.
pub struct Context {
    pub config: AppConfig,
    pub machine: Arc<AuthMachine>,
    pub client: ApiClient,
    navigator: Arc<dyn Navigator>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Context {
    #[must_use]
    pub fn login_flow(&self) -> LoginFlow {
        LoginFlow::new(
            self.client.clone(),
            self.machine.clone(),
            self.navigator.clone(),
        )
    }
}
