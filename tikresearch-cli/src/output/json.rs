//! JSON output for command results other than tables.

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;

use tikresearch_fetch::{Credential, FetchOutcome};

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(serde_json::to_string(value)?)
        }
    }

    /// Formats a working credential without the token itself.
    pub fn format_credential(&self, credential: &Credential) -> Result<String> {
        #[derive(Serialize)]
        struct CredentialOutput {
            status: &'static str,
            token: String,
            expires_at: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            scope: Option<String>,
        }

        self.format(&CredentialOutput {
            status: "ok",
            token: credential.redacted(),
            expires_at: credential.expires_at.to_rfc3339(),
            scope: credential.scope.clone(),
        })
    }

    /// Formats one line per query: what ran and how it ended.
    pub fn format_outcome(&self, outcome: &FetchOutcome) -> Result<String> {
        self.format(&OutcomeOutput::from(outcome))
    }
}

/// Per-query report.
#[derive(Debug, Serialize)]
pub struct OutcomeOutput {
    /// Description of the query.
    pub query: String,
    /// Endpoint name.
    pub endpoint: String,
    /// `ok`, `failed` or `interrupted`.
    pub status: &'static str,
    /// Records fetched.
    pub records: usize,
    /// HTTP requests made.
    pub requests: u32,
    /// Wall time in seconds.
    pub seconds: f64,
    /// Error message for failed queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&FetchOutcome> for OutcomeOutput {
    fn from(outcome: &FetchOutcome) -> Self {
        let status = match &outcome.error {
            None => "ok",
            Some(e) if e.is_cancelled() => "interrupted",
            Some(_) => "failed",
        };
        Self {
            query: outcome.query.clone(),
            endpoint: outcome.endpoint.name().to_string(),
            status,
            records: outcome.record_count(),
            requests: outcome.requests,
            seconds: round_secs(outcome.duration),
            error: outcome.error.as_ref().map(ToString::to_string),
        }
    }
}

fn round_secs(d: Duration) -> f64 {
    (d.as_secs_f64() * 1000.0).round() / 1000.0
}
