//! Configuration management.
//!
//! Settings live in a TOML file:
//!
//! ```toml
//! [credentials]
//! client_key = "awxyz"
//! client_secret = "..."        # or keep it in the keychain
//!
//! [api]
//! base_url = "https://open.tiktokapis.com/v2/"
//! timeout_secs = 30
//! refresh_margin_secs = 60
//!
//! [retry]
//! rate_limit_max_retries = 5
//! rate_limit_base_delay_secs = 30
//! server_error_max_retries = 3
//! server_error_base_delay_ms = 500
//! max_delay_secs = 300
//!
//! [paging]
//! max_count = 100
//! max_empty_pages = 5
//! window_days = 30
//! concurrency = 4
//! ```
//!
//! Every key is optional. `TIKTOK_CLIENT_KEY`, `TIKTOK_CLIENT_SECRET` and
//! `TIKRESEARCH_BASE_URL` override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use tikresearch_core::{MAX_PAGE_SIZE, MAX_WINDOW_DAYS};
use tikresearch_fetch::{FetchSettings, RetryPolicy, RetryStrategy, DEFAULT_BASE_URL};

use crate::error::StoreError;
use crate::keychain;
use crate::persistence::{default_settings_path, read_optional, write_atomic};

/// Environment variable overriding the client key.
pub const ENV_CLIENT_KEY: &str = "TIKTOK_CLIENT_KEY";

/// Environment variable overriding the client secret.
pub const ENV_CLIENT_SECRET: &str = "TIKTOK_CLIENT_SECRET";

/// Environment variable overriding the API base URL.
pub const ENV_BASE_URL: &str = "TIKRESEARCH_BASE_URL";

// ============================================================================
// Settings
// ============================================================================

/// Application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Research API client credentials.
    pub credentials: CredentialSettings,
    /// API endpoint and timeouts.
    pub api: ApiSettings,
    /// Backoff settings.
    pub retry: RetrySettings,
    /// Pagination settings.
    pub paging: PagingSettings,
}

/// Client credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Client key issued with Research API access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    /// Client secret. Prefer the keychain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// API endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the Research API.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Refresh tokens this many seconds before expiry.
    pub refresh_margin_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            refresh_margin_secs: 60,
        }
    }
}

/// Backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after HTTP 429 before giving up.
    pub rate_limit_max_retries: u32,
    /// First rate-limit backoff when the server gives no hint.
    pub rate_limit_base_delay_secs: u64,
    /// Retries after server errors and timeouts.
    pub server_error_max_retries: u32,
    /// First server-error backoff.
    pub server_error_base_delay_ms: u64,
    /// Longest single wait, server hints included.
    pub max_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            rate_limit_max_retries: 5,
            rate_limit_base_delay_secs: 30,
            server_error_max_retries: 3,
            server_error_base_delay_ms: 500,
            max_delay_secs: 300,
        }
    }
}

/// Pagination settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingSettings {
    /// Records per request.
    pub max_count: u32,
    /// Empty pages in a row followed before giving up on a window.
    pub max_empty_pages: u32,
    /// Longest date range per video request.
    pub window_days: u32,
    /// Queries run at once.
    pub concurrency: usize,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            max_count: MAX_PAGE_SIZE,
            max_empty_pages: 5,
            window_days: MAX_WINDOW_DAYS,
            concurrency: 4,
        }
    }
}

impl Settings {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_settings_path()
    }

    /// Loads settings from the default path.
    ///
    /// # Errors
    ///
    /// See [`Settings::load_from`].
    pub async fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path()).await
    }

    /// Loads settings from a specific path. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub async fn load_from(path: &Path) -> Result<Self, StoreError> {
        let Some(content) = read_optional(path).await? else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        };

        let settings: Settings = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(settings)
    }

    /// Saves settings to a specific path, readable by the owner only.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be encoded or written.
    pub async fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes(), true).await?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value. Empty values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_CLIENT_KEY) {
            debug!(var = ENV_CLIENT_KEY, "Client key taken from environment");
            self.credentials.client_key = Some(key);
        }
        if let Some(secret) = get(ENV_CLIENT_SECRET) {
            debug!(var = ENV_CLIENT_SECRET, "Client secret taken from environment");
            self.credentials.client_secret = Some(secret);
        }
        if let Some(base_url) = get(ENV_BASE_URL) {
            debug!(var = ENV_BASE_URL, base_url = %base_url, "Base URL taken from environment");
            self.api.base_url = base_url;
        }
        self
    }

    /// Checks values that would otherwise fail later, mid-run.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` describing the first bad value.
    pub fn validate(&self) -> Result<(), StoreError> {
        let url = Url::parse(&self.api.base_url)
            .map_err(|e| StoreError::Config(format!("api.base_url '{}': {e}", self.api.base_url)))?;
        if url.host_str().is_none() {
            return Err(StoreError::Config(format!(
                "api.base_url '{}' has no host",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(StoreError::Config("api.timeout_secs must be positive".into()));
        }
        if self.paging.max_count == 0 || self.paging.max_count > MAX_PAGE_SIZE {
            return Err(StoreError::Config(format!(
                "paging.max_count must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.paging.window_days == 0 || self.paging.window_days > MAX_WINDOW_DAYS {
            return Err(StoreError::Config(format!(
                "paging.window_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        Ok(())
    }

    /// Builds the fetch settings.
    pub fn to_fetch_settings(&self) -> FetchSettings {
        let max_delay = Duration::from_secs(self.retry.max_delay_secs);
        let retry = RetryPolicy {
            rate_limit: RetryStrategy::new(self.retry.rate_limit_max_retries)
                .with_base_delay(Duration::from_secs(self.retry.rate_limit_base_delay_secs))
                .with_max_delay(max_delay),
            server_error: RetryStrategy::new(self.retry.server_error_max_retries)
                .with_base_delay(Duration::from_millis(self.retry.server_error_base_delay_ms))
                .with_max_delay(max_delay)
                .with_jitter(true),
        };

        let mut settings = FetchSettings::default()
            .with_base_url(self.api.base_url.clone())
            .with_timeout(Duration::from_secs(self.api.timeout_secs))
            .with_retry(retry)
            .with_concurrency(self.paging.concurrency);
        settings.refresh_margin = Duration::from_secs(self.api.refresh_margin_secs);
        settings.max_empty_pages = self.paging.max_empty_pages;
        settings.window_days = self.paging.window_days;
        settings
    }

    /// The client key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingCredential` if no key is configured.
    pub fn client_key(&self) -> Result<&str, StoreError> {
        self.credentials
            .client_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                StoreError::MissingCredential(format!(
                    "client key: set credentials.client_key or {ENV_CLIENT_KEY}"
                ))
            })
    }

    /// The client secret, from the settings or else the keychain.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingCredential` if neither has one.
    pub fn client_secret(&self) -> Result<String, StoreError> {
        if let Some(secret) = self
            .credentials
            .client_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            return Ok(secret.to_string());
        }

        let key = self.client_key()?;
        keychain::get_client_secret(key).ok_or_else(|| {
            StoreError::MissingCredential(format!(
                "client secret for '{key}': set {ENV_CLIENT_SECRET}, \
                 credentials.client_secret, or store it with `config set-secret`"
            ))
        })
    }

    /// A copy safe to print: the secret is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.credentials.client_secret.is_some() {
            copy.credentials.client_secret = Some("********".to_string());
        }
        copy
    }

    /// Renders the settings as TOML.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TomlEncode` if encoding fails.
    pub fn to_toml(&self) -> Result<String, StoreError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
