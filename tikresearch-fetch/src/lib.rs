// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TikResearch` Fetch
//!
//! Network side of the `TikResearch` client: authentication, pagination,
//! rate limiting and retries against the TikTok Research API.
//!
//! ## Host APIs
//!
//! The [`host`] module owns the network seam:
//!
//! - [`host::Transport`] - One POST in, one response out
//! - [`host::http`] - reqwest transport with tracing and domain allowlist
//!
//! ## Fetching
//!
//! - [`auth::CredentialManager`] - Cached, single-flight bearer tokens
//! - [`paginator::Paginator`] - Lazy page sequence for one query
//! - [`retry::RetryPolicy`] - Backoff for rate limits and server errors
//! - [`client::ResearchClient`] - Ties it all together
//!
//! ## Example
//!
//! ```ignore
//! use tikresearch_core::{Filter, Query};
//! use tikresearch_fetch::{FetchSettings, ResearchClient};
//!
//! let client = ResearchClient::new(FetchSettings::default(), key, secret)?;
//! let query = Query::videos(Filter::hashtags(["cats"], None, None, None), start, end);
//!
//! let outcome = client.collect(query).await;
//! let table = outcome.table();
//! ```

// Core modules
pub mod auth;
pub mod client;
pub mod context;
pub mod error;
pub mod host;
pub mod paginator;
pub mod retry;


// Re-export key types at crate root

// Errors
pub use error::{FetchError, HttpError, RequestContext};

// Host APIs
pub use host::{HttpRequest, HttpResponse, HttpTransport, RequestBody, Transport};

// Authentication
pub use auth::{request_token, Credential, CredentialManager, TOKEN_PATH};

// Fetching
pub use client::{FetchOutcome, ResearchClient};
pub use context::{FetchSettings, DEFAULT_BASE_URL};
pub use paginator::Paginator;
pub use retry::{RetryPolicy, RetryStrategy};
