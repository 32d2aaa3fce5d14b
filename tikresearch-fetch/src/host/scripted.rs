//! Scripted transport for tests.
//!
//! Data requests are answered from a queue in order. Token requests get
//! their own queue; when it is empty a fresh token (`token-1`, `token-2`,
//! ...) valid for a day is issued.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::error::HttpError;

pub(crate) type Reply = Result<HttpResponse, HttpError>;

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    data: Mutex<VecDeque<Reply>>,
    tokens: Mutex<VecDeque<Reply>>,
    issued: AtomicU32,
    token_latency: Option<Duration>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Delays every token response, to let concurrent callers pile up.
    pub(crate) fn with_token_latency(mut self, latency: Duration) -> Self {
        self.token_latency = Some(latency);
        self
    }

    pub(crate) fn push(&self, reply: Reply) -> &Self {
        self.data.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn push_json(&self, status: u16, body: JsonValue) -> &Self {
        self.push(Ok(HttpResponse::new(status, body.to_string())))
    }

    /// A 200 page response with the given `data` object.
    pub(crate) fn push_data(&self, data: JsonValue) -> &Self {
        self.push_json(
            200,
            json!({"data": data, "error": {"code": "ok", "message": "", "log_id": "test"}}),
        )
    }

    pub(crate) fn push_token(&self, reply: Reply) -> &Self {
        self.tokens.lock().unwrap().push_back(reply);
        self
    }

    /// Every request sent so far, token requests included.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Data requests sent so far.
    pub(crate) fn data_requests(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !is_token_request(r))
            .collect()
    }

    /// JSON bodies of the data requests sent so far.
    pub(crate) fn data_bodies(&self) -> Vec<JsonValue> {
        self.data_requests()
            .into_iter()
            .filter_map(|r| match r.body {
                RequestBody::Json(body) => Some(body),
                RequestBody::Form(_) => None,
            })
            .collect()
    }

    pub(crate) fn token_requests(&self) -> usize {
        self.requests().iter().filter(|r| is_token_request(r)).count()
    }
}

fn is_token_request(request: &HttpRequest) -> bool {
    request.url.contains("oauth/token/")
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let token = is_token_request(&request);
        self.requests.lock().unwrap().push(request);

        if token {
            if let Some(latency) = self.token_latency {
                tokio::time::sleep(latency).await;
            }
            let scripted = self.tokens.lock().unwrap().pop_front();
            return scripted.unwrap_or_else(|| {
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(HttpResponse::new(
                    200,
                    json!({
                        "access_token": format!("token-{n}"),
                        "expires_in": 86_400,
                        "token_type": "Bearer"
                    })
                    .to_string(),
                ))
            });
        }

        let scripted = self.data.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Err(HttpError::Connect("script exhausted".to_string())))
    }
}
