//! Client-credentials authentication.
//!
//! The Research API uses the OAuth client-credentials grant:
//!
//! ```text
//! POST /v2/oauth/token/
//! client_key=...&client_secret=...&grant_type=client_credentials
//! ```
//!
//! ```json
//! {"access_token": "clt.xxx", "expires_in": 7200, "token_type": "Bearer"}
//! ```
//!
//! Tokens live only in memory. [`CredentialManager`] caches one token and
//! refreshes it shortly before it expires; concurrent callers share a
//! single refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{FetchError, RequestContext};
use crate::host::{HttpRequest, Transport};

/// Path of the token endpoint, relative to the API base.
pub const TOKEN_PATH: &str = "oauth/token/";

/// Lifetime assumed when the server omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: f64 = 7200.0;

// ============================================================================
// Credential
// ============================================================================

/// A bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// The token.
    pub access_token: String,
    /// Token type, normally `Bearer`.
    pub token_type: String,
    /// When the token stops working.
    pub expires_at: DateTime<Utc>,
    /// Granted scope, if reported.
    pub scope: Option<String>,
}

impl Credential {
    /// True if the token expires within `margin` of `now`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
        now.checked_add_signed(margin)
            .is_none_or(|deadline| self.expires_at <= deadline)
    }

    /// True if the token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::ZERO, Utc::now())
    }

    /// First characters of the token, for logs.
    pub fn redacted(&self) -> String {
        let prefix: String = self.access_token.chars().take(4).collect();
        format!("{prefix}****")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (expires {})",
            self.token_type,
            self.redacted(),
            self.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.redacted())
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

// ============================================================================
// Token Exchange
// ============================================================================

/// Token endpoint response. Success and error share one shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default, deserialize_with = "seconds")]
    expires_in: Option<f64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<JsonValue>,
    error_description: Option<String>,
    log_id: Option<String>,
}

/// `expires_in` as sent by the server: a number or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(f64),
    Text(String),
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Seconds>::deserialize(deserializer)? {
        Some(Seconds::Number(secs)) => Some(secs),
        Some(Seconds::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

fn auth_error(client_key: &str, message: impl Into<String>) -> FetchError {
    FetchError::Auth {
        context: RequestContext::new(
            TOKEN_PATH,
            json!({"client_key": client_key, "grant_type": "client_credentials"}),
            1,
        ),
        message: format!("Failed to obtain access token: {}", message.into()),
    }
}

/// Performs one client-credentials token exchange.
///
/// # Errors
///
/// Returns `FetchError::Auth` if the key or secret is empty, the request
/// fails, the status is not 2xx, the body carries an error, or it holds
/// no token.
#[instrument(skip(transport, client_secret), fields(url = %token_url))]
pub async fn request_token(
    transport: &dyn Transport,
    token_url: &str,
    client_key: &str,
    client_secret: &str,
) -> Result<Credential, FetchError> {
    if client_key.trim().is_empty() || client_secret.trim().is_empty() {
        return Err(auth_error(client_key, "client key and secret are required"));
    }

    let request = HttpRequest::form(
        token_url,
        vec![
            ("client_key".to_string(), client_key.to_string()),
            ("client_secret".to_string(), client_secret.to_string()),
            ("grant_type".to_string(), "client_credentials".to_string()),
        ],
    );

    let response = transport
        .send(request)
        .await
        .map_err(|e| auth_error(client_key, e.to_string()))?;

    let parsed: Option<TokenResponse> = serde_json::from_str(&response.body).ok();

    if !response.is_success() {
        let detail = parsed
            .as_ref()
            .and_then(|p| p.error_description.clone())
            .unwrap_or_else(|| response.body.chars().take(200).collect());
        warn!(status = response.status, "Token request refused");
        return Err(auth_error(
            client_key,
            format!("status {}: {detail}", response.status),
        ));
    }

    let Some(token) = parsed else {
        return Err(auth_error(client_key, "response is not valid JSON"));
    };

    if let Some(error) = token.error.as_ref().filter(|e| !e.is_null()) {
        let code = error.as_str().map_or_else(|| error.to_string(), str::to_string);
        let description = token.error_description.unwrap_or_default();
        warn!(code = %code, log_id = ?token.log_id, "Token endpoint returned an error");
        return Err(auth_error(client_key, format!("{code}: {description}")));
    }

    let access_token = token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| auth_error(client_key, "no access_token in response"))?;

    let expires_in = token
        .expires_in
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let lifetime = Duration::try_from_secs_f64(expires_in)
        .ok()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or(chrono::Duration::MAX);
    let now = Utc::now();
    let expires_at = now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC);

    let credential = Credential {
        access_token,
        token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
        expires_at,
        scope: token.scope,
    };
    debug!(credential = %credential, "Obtained access token");
    Ok(credential)
}

// ============================================================================
// Credential Manager
// ============================================================================

/// Caches a bearer token and refreshes it before it expires.
///
/// The refresh margin is capped at half the token's lifetime, so a
/// short-lived token is still reused for a while. The cache lock is held across the token exchange, so concurrent callers
/// wait for one refresh and then share its result.
pub struct CredentialManager {
    transport: Arc<dyn Transport>,
    token_url: String,
    client_key: String,
    client_secret: String,
    refresh_margin: Duration,
    /// The cached token and the margin it is refreshed at.
    cached: Mutex<Option<(Credential, Duration)>>,
    refreshes: AtomicU32,
}

impl CredentialManager {
    /// Creates a manager. No request is made until the first
    /// [`get_token`](Self::get_token).
    pub fn new(
        transport: Arc<dyn Transport>,
        token_url: impl Into<String>,
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            token_url: token_url.into(),
            client_key: client_key.into(),
            client_secret: client_secret.into(),
            refresh_margin: Duration::from_secs(60),
            cached: Mutex::new(None),
            refreshes: AtomicU32::new(0),
        }
    }

    /// Refreshes tokens this long before they expire.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// The client key.
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    /// Number of token exchanges performed so far.
    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Returns a valid token, exchanging credentials if needed.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Auth` if a needed exchange fails. The cache is
    /// left empty, so the next call tries again.
    pub async fn get_token(&self) -> Result<Credential, FetchError> {
        let mut cached = self.cached.lock().await;

        if let Some((credential, margin)) = cached.as_ref() {
            if !credential.expires_within(*margin, Utc::now()) {
                return Ok(credential.clone());
            }
            debug!(expires_at = %credential.expires_at, "Token about to expire, refreshing");
        }

        *cached = None;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let fresh = request_token(
            self.transport.as_ref(),
            &self.token_url,
            &self.client_key,
            &self.client_secret,
        )
        .await?;
        let margin = self.margin_for(&fresh, Utc::now());
        info!(expires_at = %fresh.expires_at, ?margin, "Access token refreshed");
        *cached = Some((fresh.clone(), margin));
        Ok(fresh)
    }

    fn margin_for(&self, credential: &Credential, now: DateTime<Utc>) -> Duration {
        let lifetime = (credential.expires_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.refresh_margin.min(lifetime / 2)
    }

    /// Drops `rejected` from the cache so the next call refreshes.
    ///
    /// A newer token cached meanwhile by another caller is kept.
    pub async fn invalidate(&self, rejected: &Credential) {
        let mut cached = self.cached.lock().await;
        if cached
            .as_ref()
            .is_some_and(|(c, _)| c.access_token == rejected.access_token)
        {
            debug!(token = %rejected.redacted(), "Invalidating rejected token");
            *cached = None;
        }
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("token_url", &self.token_url)
            .field("client_key", &self.client_key)
            .field("refresh_margin", &self.refresh_margin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::host::HttpResponse;
    use crate::host::RequestBody;
    use crate::host::scripted::ScriptedTransport;

    const URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";

    fn token_reply(body: JsonValue) -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse::new(200, body.to_string()))
    }

    #[tokio::test]
    async fn test_request_token_success() {
        let transport = ScriptedTransport::new();
        transport.push_token(token_reply(json!({
            "access_token": "clt.abcdef",
            "expires_in": 7199.5,
            "token_type": "Bearer"
        })));

        let credential = request_token(&transport, URL, "key", "secret").await.unwrap();
        assert_eq!(credential.access_token, "clt.abcdef");
        assert_eq!(credential.token_type, "Bearer");
        assert!(!credential.is_expired());
        assert!(credential.expires_within(Duration::from_secs(7200), Utc::now()));

        let sent = &transport.requests()[0];
        let RequestBody::Form(fields) = &sent.body else {
            panic!("token request must be a form");
        };
        assert!(fields.contains(&("grant_type".to_string(), "client_credentials".to_string())));
        assert!(sent.bearer.is_none());
    }

    #[tokio::test]
    async fn test_request_token_failures() {
        let transport = ScriptedTransport::new();
        transport
            .push_token(Ok(HttpResponse::new(
                401,
                r#"{"error":"invalid_client","error_description":"Client key or secret is incorrect."}"#,
            )))
            .push_token(token_reply(json!({"error": "invalid_request", "error_description": "bad"})))
            .push_token(token_reply(json!({"access_token": null, "expires_in": 7200})))
            .push_token(Err(HttpError::Timeout));

        for expected in ["incorrect", "invalid_request", "no access_token", "timed out"] {
            let err = request_token(&transport, URL, "key", "secret").await.unwrap_err();
            assert!(matches!(err, FetchError::Auth { .. }), "{err}");
            let msg = err.to_string();
            assert!(msg.contains("Failed to obtain access token"), "{msg}");
            assert!(msg.contains(expected), "{msg} lacks {expected}");
        }
    }

    #[tokio::test]
    async fn test_empty_credentials_never_hit_the_network() {
        let transport = ScriptedTransport::new();
        let err = request_token(&transport, URL, "", "secret").await.unwrap_err();
        assert!(matches!(err, FetchError::Auth { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_expires_in_accepts_numeric_string() {
        let transport = ScriptedTransport::new();
        transport
            .push_token(token_reply(json!({"access_token": "a", "expires_in": "120"})))
            .push_token(token_reply(json!({"access_token": "b", "expires_in": "soon"})));

        let now = Utc::now();
        let first = request_token(&transport, URL, "key", "secret").await.unwrap();
        assert!(first.expires_within(Duration::from_secs(121), now));
        assert!(!first.expires_within(Duration::from_secs(100), now));

        // unparseable text falls back to the default lifetime
        let second = request_token(&transport, URL, "key", "secret").await.unwrap();
        assert_eq!(second.access_token, "b");
        assert!(!second.expires_within(Duration::from_secs(7000), now));
    }

    #[tokio::test]
    async fn test_short_lived_token_is_reused() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_token(token_reply(json!({"access_token": "short", "expires_in": 30})));

        let manager = CredentialManager::new(transport.clone(), URL, "key", "secret")
            .with_refresh_margin(Duration::from_secs(60));

        // lifetime below the margin: reused until half of it is gone
        assert_eq!(manager.get_token().await.unwrap().access_token, "short");
        assert_eq!(manager.get_token().await.unwrap().access_token, "short");
        assert_eq!(manager.refresh_count(), 1);
        assert_eq!(transport.token_requests(), 1);
    }

    #[tokio::test]
    async fn test_manager_refreshes_near_expiry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_token(token_reply(json!({"access_token": "brief", "expires_in": 0.05})));

        let manager = CredentialManager::new(transport.clone(), URL, "key", "secret");

        assert_eq!(manager.get_token().await.unwrap().access_token, "brief");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(manager.get_token().await.unwrap().access_token, "token-1");
        assert_eq!(manager.get_token().await.unwrap().access_token, "token-1");
        assert_eq!(manager.refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let transport = Arc::new(
            ScriptedTransport::new().with_token_latency(Duration::from_millis(50)),
        );
        let manager = Arc::new(CredentialManager::new(transport.clone(), URL, "key", "secret"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_token().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().access_token, "token-1");
        }
        assert_eq!(transport.token_requests(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let transport = Arc::new(ScriptedTransport::new());
        let manager = CredentialManager::new(transport.clone(), URL, "key", "secret");

        let first = manager.get_token().await.unwrap();
        manager.invalidate(&first).await;
        let second = manager.get_token().await.unwrap();
        assert_ne!(first.access_token, second.access_token);

        // stale rejection does not evict the newer token
        manager.invalidate(&first).await;
        assert_eq!(manager.get_token().await.unwrap(), second);
        assert_eq!(transport.token_requests(), 2);
    }

    #[test]
    fn test_display_redacts_token() {
        let credential = Credential {
            access_token: "clt.secretvalue".into(),
            token_type: "Bearer".into(),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
            scope: None,
        };
        let shown = credential.to_string();
        assert!(shown.starts_with("Bearer clt.****"));
        assert!(!shown.contains("secretvalue"));
        assert!(!format!("{credential:?}").contains("secretvalue"));
    }
}
