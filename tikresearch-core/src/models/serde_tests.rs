//! Serde tests for the query and record types.
//!
//! Queries are read from user-supplied JSON files by the CLI, and records
//! are written back out as JSON, so both directions matter.

use serde_json::json;

use crate::{
    Condition, Endpoint, FieldName, Filter, Operation, Query, Record, Target, Value, VideoLength,
};

// ============================================================================
// Query Serde Tests
// ============================================================================

#[test]
fn test_query_deserializes_with_defaults() {
    let query: Query = serde_json::from_value(json!({
        "target": {
            "kind": "videos",
            "filter": {"and": [{"field_name": "keyword", "operation": "EQ", "field_values": ["cats"]}]},
            "start_date": "2024-01-01",
            "end_date": "2024-01-07"
        }
    }))
    .unwrap();

    assert_eq!(query.endpoint(), Endpoint::VideoQuery);
    assert_eq!(query.max_count(), 100);
    assert_eq!(query.limit(), None);
    assert!(query.explicit_fields().is_empty());
    match query.target() {
        Target::Videos { is_random, .. } => assert!(!is_random),
        other => panic!("unexpected target: {other:?}"),
    }
}

#[test]
fn test_user_target_tags() {
    let cases = [
        (json!({"kind": "user_info", "username": "a"}), Endpoint::UserInfo),
        (json!({"kind": "liked_videos", "username": "a"}), Endpoint::LikedVideos),
        (json!({"kind": "reposted_videos", "username": "a"}), Endpoint::RepostedVideos),
        (json!({"kind": "pinned_videos", "username": "a"}), Endpoint::PinnedVideos),
        (json!({"kind": "followers", "username": "a"}), Endpoint::Followers),
        (json!({"kind": "following", "username": "a"}), Endpoint::Following),
        (json!({"kind": "comments", "video_id": "1"}), Endpoint::Comments),
    ];
    for (json, endpoint) in cases {
        let target: Target = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(target.endpoint(), endpoint, "for {json}");
    }
}

#[test]
fn test_query_serializes_limit_and_fields() {
    let query = Query::followers("alice")
        .with_limit(500)
        .with_fields(["username"]);
    let json = serde_json::to_value(&query).unwrap();
    assert_eq!(json["target"], json!({"kind": "followers", "username": "alice"}));
    assert_eq!(json["limit"], 500);
    assert_eq!(json["fields"], json!(["username"]));
}

#[test]
fn test_unknown_operation_is_rejected() {
    let result: Result<Condition, _> = serde_json::from_value(json!({
        "field_name": "keyword",
        "operation": "LIKE",
        "field_values": ["x"]
    }));
    assert!(result.is_err());
}

#[test]
fn test_empty_clauses_are_omitted() {
    let filter = Filter::new().not(Condition::eq(FieldName::RegionCode, "US"));
    let json = serde_json::to_value(&filter).unwrap();
    assert_eq!(
        json,
        json!({"not": [{"field_name": "region_code", "operation": "EQ", "field_values": ["US"]}]})
    );
    assert_eq!(filter.not[0].operation, Operation::Eq);
}

#[test]
fn test_video_length_wire_names() {
    assert_eq!(serde_json::to_value(VideoLength::ExtraLong).unwrap(), json!("EXTRA_LONG"));
    let parsed: VideoLength = serde_json::from_value(json!("MID")).unwrap();
    assert_eq!(parsed, VideoLength::Mid);
}

// ============================================================================
// Record Serde Tests
// ============================================================================

#[test]
fn test_record_deserializes_untagged_values() {
    let record: Record = serde_json::from_value(json!({
        "id": 7,
        "ratio": 0.25,
        "name": "x",
        "flag": true,
        "tags": ["a", "b"],
        "missing": null
    }))
    .unwrap();

    assert_eq!(record.get("id"), Some(&Value::Int(7)));
    assert_eq!(record.get("ratio"), Some(&Value::Float(0.25)));
    assert_eq!(record.get("name"), Some(&Value::from("x")));
    assert_eq!(record.get("flag"), Some(&Value::Bool(true)));
    assert_eq!(
        record.get("tags"),
        Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
    );
    assert_eq!(record.get("missing"), Some(&Value::Null));
}

#[test]
fn test_record_keys_are_sorted() {
    let record: Record = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
    assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"a":2,"b":1}"#);
}
