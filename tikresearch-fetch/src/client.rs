//! Research API client.
//!
//! [`ResearchClient`] ties a transport, a credential manager and fetch
//! settings together. Pages of one query are fetched in order; separate
//! queries can run concurrently and share one token and one connection
//! pool.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use tikresearch_core::{normalize, CoreError, Endpoint, Page, Query, Schema, Table};

use crate::auth::{Credential, CredentialManager};
use crate::context::FetchSettings;
use crate::error::FetchError;
use crate::host::{HttpTransport, Transport};
use crate::paginator::Paginator;

// ============================================================================
// Fetch Outcome
// ============================================================================

/// Everything fetched for one query.
///
/// Pages fetched before an error or a cancellation are kept.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Short description of the query.
    pub query: String,
    /// Endpoint queried.
    pub endpoint: Endpoint,
    /// Preferred column order: context columns, then requested fields.
    pub columns: Vec<String>,
    /// Pages in the order they were fetched.
    pub pages: Vec<Page>,
    /// The error that ended the run early, if any.
    pub error: Option<FetchError>,
    /// HTTP requests made, retries included.
    pub requests: u32,
    /// Wall time of the run.
    pub duration: Duration,
}

impl FetchOutcome {
    fn new(query: &Query) -> Self {
        let mut columns: Vec<String> = query
            .context_columns()
            .into_iter()
            .map(|(column, _)| column)
            .collect();
        columns.extend(query.fields());
        Self {
            query: query.describe(),
            endpoint: query.endpoint(),
            columns,
            pages: Vec::new(),
            error: None,
            requests: 0,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the run reached the end without an error.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Number of raw records across all pages.
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    /// Normalizes every page into one table.
    pub fn table(&self) -> Table {
        let mut table = Table::new(&self.columns);
        for page in &self.pages {
            table.extend(normalize(page));
        }
        table
    }

    /// Normalizes every page and checks each row against the schema of
    /// the requested columns.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` for the first row that does not fit.
    pub fn validated_table(&self) -> Result<Table, CoreError> {
        let table = self.table();
        Schema::for_columns(self.endpoint, &self.columns).validate_all(table.rows())?;
        Ok(table)
    }
}

// ============================================================================
// Research Client
// ============================================================================

/// Client for the TikTok Research API.
pub struct ResearchClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialManager>,
    settings: Arc<FetchSettings>,
    cancel: CancellationToken,
}

impl ResearchClient {
    /// Creates a client backed by reqwest. Requests are only allowed to the
    /// host of the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the base URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(
        settings: FetchSettings,
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let host = settings.api_host()?;
        let transport =
            HttpTransport::with_timeout(settings.timeout)?.with_allowed_domains(Some(vec![host]));
        Ok(Self::with_transport(
            settings,
            Arc::new(transport),
            client_key,
            client_secret,
        ))
    }

    /// Creates a client on top of any transport.
    pub fn with_transport(
        settings: FetchSettings,
        transport: Arc<dyn Transport>,
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let credentials = CredentialManager::new(
            Arc::clone(&transport),
            settings.token_url(),
            client_key,
            client_secret,
        )
        .with_refresh_margin(settings.refresh_margin);

        Self {
            transport,
            credentials: Arc::new(credentials),
            settings: Arc::new(settings),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to stop all runs started by this client.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels every run of this client.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch settings in use.
    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Shared credential manager.
    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Obtains a token, proving the credentials work.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Auth` if the exchange fails.
    pub async fn check_credentials(&self) -> Result<Credential, FetchError> {
        self.credentials.get_token().await
    }

    /// Starts walking `query`. Nothing is requested until the first page is
    /// pulled.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidQuery` (wrapped) if the query is invalid.
    pub fn fetch(&self, query: Query) -> Result<Paginator, FetchError> {
        Paginator::new(
            query,
            Arc::clone(&self.transport),
            Arc::clone(&self.credentials),
            Arc::clone(&self.settings),
            self.cancel.clone(),
        )
    }

    /// Fetches every page of `query`.
    ///
    /// Never fails outright: an error ends the run and is stored in the
    /// outcome next to the pages fetched before it.
    #[instrument(skip(self, query), fields(query = %query.describe()))]
    pub async fn collect(&self, query: Query) -> FetchOutcome {
        let started = Instant::now();
        let mut outcome = FetchOutcome::new(&query);

        let mut paginator = match self.fetch(query) {
            Ok(paginator) => paginator,
            Err(e) => {
                warn!(error = %e, "Query rejected before fetching");
                outcome.error = Some(e);
                return outcome;
            }
        };

        while let Some(item) = paginator.next_page().await {
            match item {
                Ok(page) => outcome.pages.push(page),
                Err(e) => outcome.error = Some(e),
            }
        }

        outcome.requests = paginator.requests();
        outcome.duration = started.elapsed();

        match &outcome.error {
            None => info!(
                pages = outcome.pages.len(),
                records = outcome.record_count(),
                requests = outcome.requests,
                "Query complete"
            ),
            Some(e) => warn!(
                pages = outcome.pages.len(),
                records = outcome.record_count(),
                error = %e,
                "Query ended early"
            ),
        }
        outcome
    }

    /// Runs several queries, at most `settings.concurrency` at once.
    ///
    /// Outcomes come back in input order.
    pub async fn collect_many(&self, queries: Vec<Query>) -> Vec<FetchOutcome> {
        stream::iter(queries)
            .map(|query| self.collect(query))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await
    }
}

impl std::fmt::Debug for ResearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchClient")
            .field("base_url", &self.settings.base_url)
            .field("credentials", &self.credentials)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::scripted::ScriptedTransport;
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use tikresearch_core::Value;

    fn client(transport: &Arc<ScriptedTransport>) -> ResearchClient {
        let settings = FetchSettings::default()
            .with_retry(RetryPolicy::no_retry())
            .with_concurrency(2);
        ResearchClient::with_transport(settings, transport.clone(), "key", "secret")
    }

    #[tokio::test]
    async fn test_collect_keeps_pages_before_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_data(json!({
                "user_followers": [{"username": "bob", "display_name": "Bob"}],
                "cursor": 1,
                "has_more": true
            }))
            .push_json(503, json!({}));

        let outcome = client(&transport).collect(Query::followers("alice")).await;

        assert_eq!(outcome.pages.len(), 1);
        assert!(matches!(outcome.error, Some(FetchError::Upstream { .. })));
        assert_eq!(outcome.requests, 2);

        let table = outcome.validated_table().unwrap();
        assert_eq!(table.columns(), ["target_account", "display_name", "username"]);
        assert_eq!(table.cell(0, "target_account"), &Value::Text("alice".into()));
    }

    #[tokio::test]
    async fn test_rows_without_unrequested_id_pass_validation() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_data(json!({
            "videos": [{"like_count": 3, "view_count": 9}],
            "has_more": false
        }));
        let query = Query::videos(
            tikresearch_core::Filter::usernames(["alice"]),
            tikresearch_core::parse_api_date("start_date", "20240101").unwrap(),
            tikresearch_core::parse_api_date("end_date", "20240102").unwrap(),
        )
        .with_fields(["like_count", "view_count"]);

        let outcome = client(&transport).collect(query).await;
        assert!(outcome.is_complete());

        let table = outcome.validated_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "view_count"), &Value::Int(9));
    }

    #[tokio::test]
    async fn test_collect_reports_invalid_query() {
        let transport = Arc::new(ScriptedTransport::new());
        let outcome = client(&transport).collect(Query::comments("not-a-number")).await;

        assert!(matches!(
            outcome.error,
            Some(FetchError::Core(CoreError::InvalidQuery { .. }))
        ));
        assert!(outcome.pages.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_collect_many_keeps_input_order_and_shares_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_data(json!({"display_name": "Alice", "follower_count": 10}))
            .push_data(json!({"display_name": "Bob", "follower_count": 20}));

        let outcomes = client(&transport)
            .collect_many(vec![Query::user_info("alice"), Query::user_info("bob")])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(FetchOutcome::is_complete));
        assert!(outcomes[0].query.contains("alice"));
        assert!(outcomes[1].query.contains("bob"));
        assert_eq!(transport.token_requests(), 1);

        let table = outcomes[0].validated_table().unwrap();
        assert_eq!(table.cell(0, "username"), &Value::Text("alice".into()));
    }

    #[tokio::test]
    async fn test_cancelled_client_makes_no_requests() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport);
        client.cancellation().cancel();

        let outcome = client.collect(Query::liked_videos("alice")).await;

        assert!(outcome.error.as_ref().is_some_and(FetchError::is_cancelled));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_check_credentials() {
        let transport = Arc::new(ScriptedTransport::new());
        let credential = client(&transport).check_credentials().await.unwrap();
        assert_eq!(credential.access_token, "token-1");
    }
}
