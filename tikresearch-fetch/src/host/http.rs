//! HTTP transport with tracing, timeouts, and domain allowlist.
//!
//! This module provides the reqwest-backed [`Transport`]:
//! - Request/response tracing
//! - Domain allowlist (only the TikTok API host by default)
//! - Per-request timeout
//! - `Retry-After` parsing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Host the Research API lives on.
pub const TIKTOK_API_DOMAIN: &str = "open.tiktokapis.com";

/// User agent string for `TikResearch`.
const USER_AGENT: &str = concat!("tikresearch/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Transport
// ============================================================================

/// reqwest transport with tracing, timeouts, and domain allowlist.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpTransport {
    /// Creates a transport with the default timeout, limited to the
    /// TikTok API host.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Request` if the TLS backend cannot be set up.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom per-request timeout, limited to
    /// the TikTok API host.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Request` if the TLS backend cannot be set up.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner: client,
            allowed_domains: Some(vec![TIKTOK_API_DOMAIN.to_string()]),
        })
    }

    /// Replaces the domain allowlist. `None` lifts all restrictions.
    #[must_use]
    pub fn with_allowed_domains(mut self, domains: Option<Vec<String>>) -> Self {
        self.allowed_domains = domains;
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let Some(ref allowed) = self.allowed_domains else {
            return Ok(()); // No restrictions
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Returns the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.is_domain_allowed(&request.url)?;

        let mut builder = self.inner.post(&request.url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(fields) => builder.form(fields),
        };

        debug!("POST request");
        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let retry_after = response.retry_after();
        let body = response.text().await.map_err(classify)?;
        debug!(status, bytes = body.len(), "Response received");

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else if err.is_connect() {
        HttpError::Connect(err.to_string())
    } else {
        HttpError::Request(err)
    }
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Extension trait for Response handling.
pub trait ResponseExt {
    /// The `Retry-After` header as a delay from now.
    fn retry_after(&self) -> Option<Duration>;
}

impl ResponseExt for Response {
    fn retry_after(&self) -> Option<Duration> {
        self.headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after)
    }
}

/// Parses a `Retry-After` value: delay seconds (possibly fractional) or an
/// HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    parse_retry_after_at(value, Utc::now())
}

/// Parses a `Retry-After` value relative to `now`. Dates in the past give a
/// zero delay.
pub fn parse_retry_after_at(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        at.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_allowlist() {
        let transport = HttpTransport::new().unwrap();

        assert!(transport
            .is_domain_allowed("https://open.tiktokapis.com/v2/research/video/query/")
            .is_ok());
        assert!(transport.is_domain_allowed("https://evil.com/steal").is_err());
    }

    #[test]
    fn test_subdomain_matching() {
        let transport = HttpTransport::new()
            .unwrap()
            .with_allowed_domains(Some(vec!["tiktokapis.com".to_string()]));

        assert!(transport.is_domain_allowed("https://open.tiktokapis.com/v2/").is_ok());
        assert!(transport.is_domain_allowed("https://nottiktokapis.com/").is_err());
    }

    #[test]
    fn test_no_domain_restrictions() {
        let transport = HttpTransport::new().unwrap().with_allowed_domains(None);

        assert!(transport.is_domain_allowed("http://127.0.0.1:8080/v2/").is_ok());
        assert!(transport.is_domain_allowed("not-a-valid-url").is_err());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:27:00 GMT")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(
            parse_retry_after_at("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        // Already past.
        assert_eq!(
            parse_retry_after_at("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
    }
}
