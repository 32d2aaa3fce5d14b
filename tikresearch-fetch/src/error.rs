//! Fetch error types.

use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use tikresearch_core::CoreError;

// ============================================================================
// Request Context
// ============================================================================

/// What was being requested when an error occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// Endpoint name or path (e.g. `followers`, `oauth/token/`).
    pub endpoint: String,
    /// Request parameters, without secrets.
    pub params: JsonValue,
    /// Requests made for this logical request, retries included.
    pub attempts: u32,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(endpoint: impl Into<String>, params: JsonValue, attempts: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
            attempts,
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} attempt(s)", self.endpoint, self.attempts)
    }
}

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The credentials were refused, or a fresh token was rejected too.
    #[error("Authentication failed ({context}): {message}")]
    Auth {
        /// The failed request.
        context: RequestContext,
        /// Server or client explanation.
        message: String,
    },

    /// Still rate limited after the configured number of retries.
    #[error("Rate limit exceeded ({context}), server asked to retry after {retry_after:?}")]
    RateLimitExceeded {
        /// The failed request.
        context: RequestContext,
        /// Last `Retry-After` the server sent.
        retry_after: Option<Duration>,
    },

    /// Server errors, timeouts or garbled bodies outlasted the retries.
    #[error("Upstream error ({context}){}: {message}", status_suffix(.status))]
    Upstream {
        /// The failed request.
        context: RequestContext,
        /// Last HTTP status, if a response arrived.
        status: Option<u16>,
        /// Last failure.
        message: String,
    },

    /// The server refused the request; retrying will not help.
    #[error("Request rejected ({context}) with status {status} [{code}]: {message}")]
    Rejected {
        /// The failed request.
        context: RequestContext,
        /// HTTP status.
        status: u16,
        /// API error code.
        code: String,
        /// API error message.
        message: String,
    },

    /// The run was cancelled.
    #[error("Cancelled ({context})")]
    Cancelled {
        /// The interrupted request.
        context: RequestContext,
    },

    /// HTTP transport failed in a way retrying will not fix.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error (invalid query or schema).
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

impl FetchError {
    /// The request an error belongs to, if it came from one.
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            Self::Auth { context, .. }
            | Self::RateLimitExceeded { context, .. }
            | Self::Upstream { context, .. }
            | Self::Rejected { context, .. }
            | Self::Cancelled { context } => Some(context),
            _ => None,
        }
    }

    /// Attempt count of the failed request, or 0.
    pub fn attempts(&self) -> u32 {
        self.context().map_or(0, |c| c.attempts)
    }

    /// True for errors that may go away on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::Upstream { .. } => true,
            Self::Http(e) => e.is_transient(),
            _ => false,
        }
    }

    /// True if the caller may run the same query again after a cooldown.
    pub fn is_retryable_by_caller(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. } | Self::Upstream { .. })
    }

    /// True for cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Could not connect.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

impl HttpError {
    /// True for timeouts and connection failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::DomainNotAllowed(_) | Self::InvalidUrl(_) => false,
        }
    }
}
