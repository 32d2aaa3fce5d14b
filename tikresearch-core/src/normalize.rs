//! Response normalization.
//!
//! Turns raw page records into flat [`Record`]s:
//!
//! - nested objects flatten to dotted keys (`video_label.content`)
//! - an empty object becomes `Null`
//! - arrays of scalars stay lists; arrays holding objects or arrays are
//!   kept as JSON text
//! - requested fields the server left out are filled with `Null`
//!
//! Normalizing an already normalized record (via [`Record::to_json`])
//! returns it unchanged.

use serde_json::{Map, Value as JsonValue};

use crate::models::{Page, Record, Value};

/// Normalizes every record of a page, in order.
pub fn normalize(page: &Page) -> Vec<Record> {
    page.records
        .iter()
        .map(|raw| normalize_record(raw, &page.fields))
        .collect()
}

/// Normalizes one raw record, filling in missing `fields` with `Null`.
pub fn normalize_record(raw: &Map<String, JsonValue>, fields: &[String]) -> Record {
    let mut flat = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        flatten_into(key.clone(), value, &mut flat);
    }
    let mut record: Record = flat.into_iter().collect();

    for field in fields {
        if !record.contains(field) && !has_nested(&record, field) {
            record.insert(field.clone(), Value::Null);
        }
    }
    record
}

fn has_nested(record: &Record, field: &str) -> bool {
    let prefix = format!("{field}.");
    record.keys().any(|k| k.starts_with(&prefix))
}

fn flatten_into(key: String, value: &JsonValue, out: &mut Vec<(String, Value)>) {
    match value {
        JsonValue::Object(map) if map.is_empty() => out.push((key, Value::Null)),
        JsonValue::Object(map) => {
            for (child, nested) in map {
                flatten_into(format!("{key}.{child}"), nested, out);
            }
        }
        JsonValue::Array(items) => {
            let scalars: Option<Vec<Value>> = items.iter().map(Value::from_scalar).collect();
            let cell = match scalars {
                Some(list) => Value::List(list),
                None => Value::Text(value.to_string()),
            };
            out.push((key, cell));
        }
        scalar => {
            // from_scalar only fails for arrays and objects, handled above
            out.push((key, Value::from_scalar(scalar).unwrap_or_default()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Endpoint;
    use serde_json::json;

    fn fixture_page() -> Page {
        let data = json!({
            "videos": [
                {
                    "id": 7_301_234_567_890_123_i64,
                    "username": "alice",
                    "region_code": "DE",
                    "like_count": 12,
                    "hashtag_names": ["germany", "travel"],
                    "video_label": {"content": "ad"},
                    "hashtag_info_list": [{"hashtag_id": 1, "hashtag_name": "germany"}],
                    "voice_to_text": null
                },
                {
                    "id": 7_301_234_567_890_124_i64,
                    "username": "bob",
                    "like_count": 0.5,
                    "effect_ids": [],
                    "extra": {}
                }
            ],
            "cursor": 2,
            "has_more": false
        });
        Page::from_data(
            Endpoint::VideoQuery,
            0,
            Some(&data),
            vec!["id".into(), "username".into(), "region_code".into(), "video_label".into()],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_fixture_normalizes_to_literal_records() {
        let records = normalize(&fixture_page());

        let first: Record = [
            ("id", Value::Int(7_301_234_567_890_123)),
            ("username", Value::from("alice")),
            ("region_code", Value::from("DE")),
            ("like_count", Value::Int(12)),
            (
                "hashtag_names",
                Value::List(vec![Value::from("germany"), Value::from("travel")]),
            ),
            ("video_label.content", Value::from("ad")),
            (
                "hashtag_info_list",
                Value::from(r#"[{"hashtag_id":1,"hashtag_name":"germany"}]"#),
            ),
            ("voice_to_text", Value::Null),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let second: Record = [
            ("id", Value::Int(7_301_234_567_890_124)),
            ("username", Value::from("bob")),
            ("region_code", Value::Null),
            ("like_count", Value::Float(0.5)),
            ("effect_ids", Value::List(vec![])),
            ("extra", Value::Null),
            ("video_label", Value::Null),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        assert_eq!(records, vec![first, second]);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let page = fixture_page();
        for record in normalize(&page) {
            let again = normalize_record(&record.to_json(), &page.fields);
            assert_eq!(again, record);
        }
    }

    #[test]
    fn test_deep_nesting_flattens_with_dots() {
        let raw = json!({"a": {"b": {"c": 1}, "d": [true, null]}});
        let record = normalize_record(raw.as_object().unwrap(), &[]);
        assert_eq!(record.get("a.b.c"), Some(&Value::Int(1)));
        assert_eq!(
            record.get("a.d"),
            Some(&Value::List(vec![Value::Bool(true), Value::Null]))
        );
        assert!(!record.contains("a"));
    }

    #[test]
    fn test_missing_fields_become_null() {
        let raw = json!({"username": "alice"});
        let record = normalize_record(raw.as_object().unwrap(), &["display_name".to_string()]);
        assert_eq!(record.get("display_name"), Some(&Value::Null));
        assert_eq!(record.len(), 2);
    }
}
