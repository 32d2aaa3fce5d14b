//! Host APIs for the Research API client.
//!
//! - [`http`] - reqwest-backed [`Transport`] with tracing and domain allowlist
//!
//! Everything above this module talks to the network through the
//! [`Transport`] trait, so tests can swap in a scripted double.

pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::error::HttpError;

pub use http::HttpTransport;

// ============================================================================
// Requests and Responses
// ============================================================================

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json`.
    Json(JsonValue),
    /// `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

/// An outgoing POST request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Absolute URL, query string included.
    pub url: String,
    /// Bearer token, if the request is authenticated.
    pub bearer: Option<String>,
    /// Body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// A JSON POST.
    pub fn json(url: impl Into<String>, body: JsonValue) -> Self {
        Self {
            url: url.into(),
            bearer: None,
            body: RequestBody::Json(body),
        }
    }

    /// A form POST.
    pub fn form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            bearer: None,
            body: RequestBody::Form(fields),
        }
    }

    /// Adds a bearer token.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// A received response, body fully read.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status.
    pub status: u16,
    /// Parsed `Retry-After` header.
    pub retry_after: Option<Duration>,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Sets the `Retry-After` value.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 429.
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// 5xx.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Sends one HTTP request. Implementations do not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and reads the whole response body.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}
