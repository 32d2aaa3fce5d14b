//! Cursor pagination with rate-limit and retry handling.
//!
//! A [`Paginator`] walks one query page by page. Each advance sends one
//! logical request; retries happen inside the advance:
//!
//! | response | action |
//! |----------|--------|
//! | 429, or `rate_limit_exceeded` in the body | back off, honoring `Retry-After` |
//! | 5xx, timeout, connection failure, bad JSON | back off with jitter |
//! | 401 | refresh the token, retry once |
//! | other 4xx | fail |
//!
//! The cursor of page N is sent back verbatim for page N+1, so the pages
//! of one query are always fetched one after another. Video queries longer
//! than the API window are split into windows, walked in order.

use futures::stream::{self, Stream};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use tikresearch_core::{ApiResponse, Cursor, Endpoint, Page, Query};

use crate::auth::CredentialManager;
use crate::context::FetchSettings;
use crate::error::{FetchError, HttpError, RequestContext};
use crate::host::{HttpRequest, HttpResponse, Transport};

/// Body code the API uses for rate limiting.
const RATE_LIMIT_CODE: &str = "rate_limit_exceeded";

/// Body code for an expired or revoked token.
const INVALID_TOKEN_CODE: &str = "access_token_invalid";

/// Body code for a server-side failure reported with a 2xx status.
const INTERNAL_ERROR_CODE: &str = "internal_error";

// ============================================================================
// Attempt Failures
// ============================================================================

/// Why a single attempt did not produce a page.
#[derive(Debug)]
enum Failure {
    RateLimited { retry_after: Option<Duration> },
    Transient { status: Option<u16>, message: String },
    Unauthorized { message: String },
    Rejected { status: u16, code: String, message: String },
    Fatal(FetchError),
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Paginator
// ============================================================================

/// A lazy, finite sequence of pages for one query.
///
/// Ends after the last page or the first error; it cannot be restarted.
pub struct Paginator {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialManager>,
    settings: Arc<FetchSettings>,
    cancel: CancellationToken,
    endpoint: Endpoint,
    fields: Vec<String>,
    context: Vec<(String, JsonValue)>,
    page_size: u32,
    windows: VecDeque<Query>,
    window: Option<Query>,
    cursor: Option<Cursor>,
    empty_run: u32,
    remaining: Option<usize>,
    index: usize,
    requests: u32,
    finished: bool,
}

impl Paginator {
    /// Validates `query` and prepares to walk it. No request is made yet.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Core` with `CoreError::InvalidQuery` if the
    /// query violates any constraint.
    pub fn new(
        query: Query,
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialManager>,
        settings: Arc<FetchSettings>,
        cancel: CancellationToken,
    ) -> Result<Self, FetchError> {
        query.validate()?;

        let windows: VecDeque<Query> = query.windows(settings.window_days).into();
        if windows.len() > 1 {
            debug!(query = %query.describe(), windows = windows.len(), "Split date range into windows");
        }

        Ok(Self {
            transport,
            credentials,
            settings,
            cancel,
            endpoint: query.endpoint(),
            fields: query.fields(),
            context: query.context_columns(),
            page_size: query.max_count(),
            windows,
            window: None,
            cursor: None,
            empty_run: 0,
            remaining: query.limit(),
            index: 0,
            requests: 0,
            finished: false,
        })
    }

    /// Endpoint being walked.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Pages yielded so far.
    pub fn pages_yielded(&self) -> usize {
        self.index
    }

    /// HTTP requests made so far, retries included.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// True once the sequence has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches the next non-empty page.
    ///
    /// Returns `None` when the query is exhausted, its limit is reached, or
    /// after an error has been returned.
    pub async fn next_page(&mut self) -> Option<Result<Page, FetchError>> {
        if self.finished {
            return None;
        }
        match self.advance().await {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Turns the paginator into a stream of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page, FetchError>> + Send {
        stream::unfold(self, |mut paginator| async move {
            paginator.next_page().await.map(|item| (item, paginator))
        })
    }

    async fn advance(&mut self) -> Result<Option<Page>, FetchError> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }

            let query = match self.window.take() {
                Some(query) => query,
                None => match self.windows.pop_front() {
                    Some(next) => {
                        self.cursor = None;
                        self.empty_run = 0;
                        next
                    }
                    None => return Ok(None),
                },
            };

            let page_size = match self.remaining {
                Some(remaining) => self
                    .page_size
                    .min(u32::try_from(remaining).unwrap_or(u32::MAX)),
                None => self.page_size,
            };

            let mut page = self.request_page(&query, page_size).await?;
            self.cursor = page.cursor.clone();
            if !page.is_last() {
                self.window = Some(query);
            }

            if page.is_empty() {
                if page.is_last() {
                    continue;
                }
                self.empty_run += 1;
                if self.empty_run > self.settings.max_empty_pages {
                    warn!(
                        endpoint = %self.endpoint,
                        empty_pages = self.empty_run,
                        "Too many empty pages in a row, giving up on this window"
                    );
                    self.window = None;
                } else {
                    debug!(endpoint = %self.endpoint, "Skipping empty page");
                }
                continue;
            }
            self.empty_run = 0;

            if let Some(remaining) = self.remaining {
                if page.len() >= remaining {
                    page.truncate(remaining);
                    self.remaining = Some(0);
                    self.window = None;
                    self.windows.clear();
                } else {
                    self.remaining = Some(remaining - page.len());
                }
            }

            page.index = self.index;
            self.index += 1;
            return Ok(Some(page));
        }
    }

    fn request_context(&self, body: &JsonValue, attempts: u32) -> RequestContext {
        RequestContext::new(self.endpoint.name(), body.clone(), attempts)
    }

    #[instrument(skip(self, query), fields(endpoint = %self.endpoint, page = self.index))]
    async fn request_page(&mut self, query: &Query, page_size: u32) -> Result<Page, FetchError> {
        let body = query.request_body(self.cursor.as_ref(), page_size);
        let url = self.settings.endpoint_url(self.endpoint, &self.fields);

        let mut attempts = 0u32;
        let mut rate_limit_retries = 0u32;
        let mut server_retries = 0u32;
        let mut refreshed = false;

        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled {
                    context: self.request_context(&body, attempts),
                });
            }

            let credential = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Err(FetchError::Cancelled {
                        context: self.request_context(&body, attempts),
                    });
                }
                credential = self.credentials.get_token() => credential?,
            };
            attempts += 1;
            self.requests += 1;
            debug!(attempt = attempts, page_size, "Requesting page");

            let request = HttpRequest::json(&url, body.clone()).with_bearer(&credential.access_token);
            let sent = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Err(FetchError::Cancelled {
                        context: self.request_context(&body, attempts),
                    });
                }
                result = self.transport.send(request) => result,
            };

            let failure = match self.classify(sent) {
                Ok(page) => {
                    debug!(records = page.len(), has_more = page.has_more, "Page received");
                    return Ok(page);
                }
                Err(failure) => failure,
            };

            match failure {
                Failure::RateLimited { retry_after } => {
                    let strategy = &self.settings.retry.rate_limit;
                    if !strategy.allows(rate_limit_retries) {
                        warn!(attempts, "Rate limit retries exhausted");
                        return Err(FetchError::RateLimitExceeded {
                            context: self.request_context(&body, attempts),
                            retry_after,
                        });
                    }
                    rate_limit_retries += 1;
                    let delay = strategy.next_delay(rate_limit_retries, retry_after);
                    warn!(
                        retry = rate_limit_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Rate limited, backing off"
                    );
                    self.pause(delay, &body, attempts).await?;
                }
                Failure::Transient { status, message } => {
                    let strategy = &self.settings.retry.server_error;
                    if !strategy.allows(server_retries) {
                        warn!(attempts, error = %message, "Server error retries exhausted");
                        return Err(FetchError::Upstream {
                            context: self.request_context(&body, attempts),
                            status,
                            message,
                        });
                    }
                    server_retries += 1;
                    let delay = strategy.next_delay(server_retries, None);
                    warn!(
                        retry = server_retries,
                        status = ?status,
                        error = %message,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Request failed, retrying"
                    );
                    self.pause(delay, &body, attempts).await?;
                }
                Failure::Unauthorized { message } => {
                    if refreshed {
                        return Err(FetchError::Auth {
                            context: self.request_context(&body, attempts),
                            message,
                        });
                    }
                    refreshed = true;
                    warn!(token = %credential.redacted(), "Token rejected, refreshing");
                    self.credentials.invalidate(&credential).await;
                }
                Failure::Rejected {
                    status,
                    code,
                    message,
                } => {
                    warn!(status, code = %code, error = %message, "Request rejected");
                    return Err(FetchError::Rejected {
                        context: self.request_context(&body, attempts),
                        status,
                        code,
                        message,
                    });
                }
                Failure::Fatal(e) => return Err(e),
            }
        }
    }

    /// Sleeps for a backoff delay unless cancelled first.
    async fn pause(&self, delay: Duration, body: &JsonValue, attempts: u32) -> Result<(), FetchError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(FetchError::Cancelled {
                context: self.request_context(body, attempts),
            }),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn classify(&self, sent: Result<HttpResponse, HttpError>) -> Result<Page, Failure> {
        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                return Err(Failure::Transient {
                    status: None,
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(Failure::Fatal(e.into())),
        };
        let status = response.status;

        if response.is_rate_limited() {
            return Err(Failure::RateLimited {
                retry_after: response.retry_after,
            });
        }
        if response.is_server_error() {
            return Err(Failure::Transient {
                status: Some(status),
                message: snippet(&response.body),
            });
        }

        let envelope = ApiResponse::parse(&response.body);

        if status == 401 {
            let message = envelope
                .ok()
                .and_then(|e| e.error)
                .map_or_else(|| snippet(&response.body), |e| e.message);
            return Err(Failure::Unauthorized { message });
        }

        if !response.is_success() {
            let (code, message) = envelope
                .ok()
                .and_then(|e| e.error)
                .map_or_else(
                    || ("http_error".to_string(), snippet(&response.body)),
                    |e| (e.code, e.message),
                );
            if code == RATE_LIMIT_CODE {
                return Err(Failure::RateLimited {
                    retry_after: response.retry_after,
                });
            }
            return Err(Failure::Rejected {
                status,
                code,
                message,
            });
        }

        let envelope = envelope.map_err(|e| Failure::Transient {
            status: Some(status),
            message: format!("undecodable response body: {e}"),
        })?;

        if let Some(error) = envelope.failure() {
            return Err(match error.code.as_str() {
                RATE_LIMIT_CODE => Failure::RateLimited {
                    retry_after: response.retry_after,
                },
                INVALID_TOKEN_CODE => Failure::Unauthorized {
                    message: error.message.clone(),
                },
                INTERNAL_ERROR_CODE => Failure::Transient {
                    status: Some(status),
                    message: error.message.clone(),
                },
                _ => Failure::Rejected {
                    status,
                    code: error.code.clone(),
                    message: error.message.clone(),
                },
            });
        }

        Page::from_data(
            self.endpoint,
            self.index,
            envelope.data.as_ref(),
            self.fields.clone(),
            &self.context,
        )
        .map_err(|e| Failure::Transient {
            status: Some(status),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for Paginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("endpoint", &self.endpoint)
            .field("index", &self.index)
            .field("requests", &self.requests)
            .field("remaining", &self.remaining)
            .field("windows_left", &self.windows.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
