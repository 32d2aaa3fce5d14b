//! Pages and cursors.
//!
//! Every Research API response has the same envelope:
//!
//! ```json
//! {
//!   "data": {"videos": [...], "cursor": 100, "has_more": true, "search_id": "..."},
//!   "error": {"code": "ok", "message": "", "log_id": "..."}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::endpoint::Endpoint;
use crate::error::CoreError;

/// Keys the server uses to continue a listing.
const CONTINUATION_KEYS: &[&str] = &["cursor", "search_id"];

// ============================================================================
// Response Envelope
// ============================================================================

/// Error object in a response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable code, `"ok"` on success.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Server-side log id, useful when reporting problems upstream.
    #[serde(default)]
    pub log_id: Option<String>,
}

impl ApiErrorBody {
    /// True if the code signals success.
    pub fn is_ok(&self) -> bool {
        self.code.is_empty() || self.code == "ok"
    }
}

/// A decoded response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    /// Payload.
    #[serde(default)]
    pub data: Option<JsonValue>,
    /// Error status.
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

impl ApiResponse {
    /// Decodes an envelope from a response body.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the body is not valid JSON.
    pub fn parse(body: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Returns the error body if the server reported a failure.
    pub fn failure(&self) -> Option<&ApiErrorBody> {
        self.error.as_ref().filter(|e| !e.is_ok())
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Opaque continuation token.
///
/// Holds whatever continuation fields the server returned; they are sent
/// back unchanged with the next request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Map<String, JsonValue>);

impl Cursor {
    /// Extracts the continuation fields from a response `data` object.
    ///
    /// Returns `None` if the server sent none (or only nulls/empty strings).
    pub fn from_data(data: &Map<String, JsonValue>) -> Option<Self> {
        let fields: Map<String, JsonValue> = CONTINUATION_KEYS
            .iter()
            .filter_map(|key| {
                let value = data.get(*key)?;
                let present = match value {
                    JsonValue::Null => false,
                    JsonValue::String(s) => !s.is_empty(),
                    _ => true,
                };
                present.then(|| ((*key).to_string(), value.clone()))
            })
            .collect();

        // A search_id alone cannot continue a listing
        if fields.contains_key("cursor") {
            Some(Self(fields))
        } else {
            None
        }
    }

    /// Merges the continuation fields into a request body.
    pub fn apply(&self, body: &mut Map<String, JsonValue>) {
        for (key, value) in &self.0 {
            body.insert(key.clone(), value.clone());
        }
    }

    /// Returns a continuation field.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Numeric cursor position, if the server uses one.
    pub fn position(&self) -> Option<u64> {
        self.0.get("cursor").and_then(JsonValue::as_u64)
    }

    /// The search id of a video query, if any.
    pub fn search_id(&self) -> Option<&str> {
        self.0.get("search_id").and_then(JsonValue::as_str)
    }
}

// ============================================================================
// Page
// ============================================================================

/// One API response worth of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Endpoint the page came from.
    pub endpoint: Endpoint,
    /// Zero-based position in the run.
    pub index: usize,
    /// Raw records, in server order.
    pub records: Vec<Map<String, JsonValue>>,
    /// Continuation for the next page. Always present when `has_more` is set.
    pub cursor: Option<Cursor>,
    /// Whether another page follows.
    pub has_more: bool,
    /// Fields the query asked for; missing ones normalize to null.
    pub fields: Vec<String>,
}

impl Page {
    /// Builds a page from a response `data` value.
    ///
    /// `context` columns are stamped onto every record. `has_more` is only
    /// kept when the server also sent a cursor, and is cleared once the
    /// endpoint's cursor ceiling is reached.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if `data` or a record is not a JSON
    /// object.
    pub fn from_data(
        endpoint: Endpoint,
        index: usize,
        data: Option<&JsonValue>,
        fields: Vec<String>,
        context: &[(String, JsonValue)],
    ) -> Result<Self, CoreError> {
        let empty = Map::new();
        let data = match data {
            None | Some(JsonValue::Null) => &empty,
            Some(JsonValue::Object(map)) => map,
            Some(other) => {
                return Err(CoreError::InvalidData(format!(
                    "{endpoint}: data is not an object: {other}"
                )));
            }
        };

        let mut records = match endpoint.records_key() {
            None if data.is_empty() => Vec::new(),
            None => vec![data.clone()],
            Some(key) => match data.get(key) {
                None | Some(JsonValue::Null) => Vec::new(),
                Some(JsonValue::Array(items)) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        JsonValue::Object(map) => Ok(map.clone()),
                        _ => Err(CoreError::InvalidData(format!(
                            "{endpoint}: {key}[{i}] is not an object"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => {
                    return Err(CoreError::InvalidData(format!(
                        "{endpoint}: {key} is not an array"
                    )));
                }
            },
        };

        for record in &mut records {
            for (column, value) in context {
                record.insert(column.clone(), value.clone());
            }
        }

        let (cursor, has_more) = if endpoint.is_paginated() {
            let cursor = Cursor::from_data(data);
            let announced = data
                .get("has_more")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            let position = cursor.as_ref().and_then(Cursor::position);
            let below_ceiling = match (endpoint.cursor_ceiling(), position) {
                (Some(ceiling), Some(position)) => position < ceiling,
                _ => true,
            };
            if announced && cursor.is_none() {
                debug!(%endpoint, index, "has_more without cursor, treating page as last");
            }
            let has_more = announced && cursor.is_some() && below_ceiling;
            (cursor, has_more)
        } else {
            (None, false)
        };

        Ok(Self {
            endpoint,
            index,
            records,
            cursor,
            has_more,
            fields,
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the page holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True if no page follows this one.
    pub fn is_last(&self) -> bool {
        !self.has_more
    }

    /// Drops records past `len` and marks the page as the last one.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
        self.has_more = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(endpoint: Endpoint, data: JsonValue) -> Page {
        Page::from_data(endpoint, 0, Some(&data), Vec::new(), &[]).unwrap()
    }

    #[test]
    fn test_video_page_with_cursor() {
        let page = page(
            Endpoint::VideoQuery,
            json!({
                "videos": [{"id": 1}, {"id": 2}],
                "cursor": 100,
                "search_id": "abc",
                "has_more": true
            }),
        );
        assert_eq!(page.len(), 2);
        assert!(page.has_more);
        let cursor = page.cursor.unwrap();
        assert_eq!(cursor.position(), Some(100));
        assert_eq!(cursor.search_id(), Some("abc"));
    }

    #[test]
    fn test_has_more_without_cursor_is_last() {
        let page = page(
            Endpoint::Followers,
            json!({"user_followers": [{"username": "a"}], "has_more": true}),
        );
        assert!(page.is_last());
        assert!(page.cursor.is_none());
    }

    #[test]
    fn test_search_id_alone_is_not_a_cursor() {
        let page = page(
            Endpoint::VideoQuery,
            json!({"videos": [], "search_id": "abc", "has_more": true}),
        );
        assert!(page.cursor.is_none());
        assert!(page.is_last());
    }

    #[test]
    fn test_comment_cursor_ceiling() {
        let page = page(
            Endpoint::Comments,
            json!({"comments": [{"id": 1}], "cursor": 1000, "has_more": true}),
        );
        assert!(page.is_last());
    }

    #[test]
    fn test_user_info_data_is_the_record() {
        let info = page(
            Endpoint::UserInfo,
            json!({"display_name": "Alice", "follower_count": 3}),
        );
        assert_eq!(info.len(), 1);
        assert!(info.is_last());

        let empty = page(Endpoint::UserInfo, json!({}));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_context_is_stamped() {
        let data = json!({"user_following": [{"username": "b"}], "has_more": false, "cursor": 0});
        let page = Page::from_data(
            Endpoint::Following,
            3,
            Some(&data),
            Vec::new(),
            &[("target_account".to_string(), json!("alice"))],
        )
        .unwrap();
        assert_eq!(page.index, 3);
        assert_eq!(page.records[0]["target_account"], "alice");
    }

    #[test]
    fn test_non_object_record_is_rejected() {
        let data = json!({"videos": [1, 2]});
        let err = Page::from_data(Endpoint::VideoQuery, 0, Some(&data), Vec::new(), &[]).unwrap_err();
        assert!(err.to_string().contains("videos[0]"));
    }

    #[test]
    fn test_envelope_failure() {
        let resp = ApiResponse::parse(
            r#"{"data": {}, "error": {"code": "invalid_params", "message": "bad", "log_id": "x"}}"#,
        )
        .unwrap();
        assert_eq!(resp.failure().unwrap().code, "invalid_params");

        let resp = ApiResponse::parse(r#"{"data": {}, "error": {"code": "ok", "message": ""}}"#).unwrap();
        assert!(resp.failure().is_none());
    }

    #[test]
    fn test_cursor_applies_verbatim() {
        let data = json!({"cursor": 1_700_000_000, "search_id": "s-1"});
        let cursor = Cursor::from_data(data.as_object().unwrap()).unwrap();
        let mut body = Map::new();
        body.insert("username".into(), json!("alice"));
        cursor.apply(&mut body);
        assert_eq!(body["cursor"], json!(1_700_000_000));
        assert_eq!(body["search_id"], json!("s-1"));
    }
}
