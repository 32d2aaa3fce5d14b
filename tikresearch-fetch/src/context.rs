//! Fetch settings.
//!
//! Everything the fetcher needs to know besides the query itself: where
//! the API lives, how long to wait, and how hard to retry.

use std::time::Duration;
use url::Url;

use tikresearch_core::{Endpoint, MAX_WINDOW_DAYS};

use crate::auth::TOKEN_PATH;
use crate::error::HttpError;
use crate::retry::RetryPolicy;

/// Research API base URL.
pub const DEFAULT_BASE_URL: &str = "https://open.tiktokapis.com/v2/";

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// API base URL, ending in `/`.
    pub base_url: String,
    /// Timeout for a single HTTP call.
    pub timeout: Duration,
    /// Refresh tokens this long before they expire.
    pub refresh_margin: Duration,
    /// Retry strategies.
    pub retry: RetryPolicy,
    /// Consecutive empty non-terminal pages followed before a window is
    /// given up.
    pub max_empty_pages: u32,
    /// Longest date range a single video request may span.
    pub window_days: u32,
    /// Queries run at once by `collect_many`.
    pub concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            refresh_margin: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            max_empty_pages: 5,
            window_days: MAX_WINDOW_DAYS,
            concurrency: 4,
        }
    }
}

impl FetchSettings {
    /// Sets the base URL, adding a trailing `/` if missing.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the concurrency of `collect_many`.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Host of the base URL.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::InvalidUrl` if the base URL does not parse or
    /// has no host.
    pub fn api_host(&self) -> Result<String, HttpError> {
        let url = Url::parse(&self.base_url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| HttpError::InvalidUrl(format!("no host in {}", self.base_url)))
    }

    /// URL of the token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url)
    }

    /// URL for a data request, with the `fields` parameter if the endpoint
    /// takes one.
    pub fn endpoint_url(&self, endpoint: Endpoint, fields: &[String]) -> String {
        let url = format!("{}{}", self.base_url, endpoint.path());
        if endpoint.takes_fields() && !fields.is_empty() {
            format!("{url}?fields={}", fields.join(","))
        } else {
            url
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
