//! CLI output formatting tests.
//!
//! These tests verify tables and status lines for both text and JSON
//! output modes.

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::TextFormatter;
    use std::time::Duration;
    use tikresearch_core::{Record, Table, Value};

    fn table() -> Table {
        let mut first = Record::new();
        first.insert("id", 7_i64);
        first.insert("username", "alice");
        let mut second = Record::new();
        second.insert("id", 123_456_i64);
        second.insert("username", Value::Null);

        let mut table = Table::new(["id", "username"]);
        table.push(first);
        table.push(second);
        table
    }

    #[test]
    fn test_empty_table() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.format_table(&Table::new(["id"])), "No results");
    }

    #[test]
    fn test_table_columns_are_aligned() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_table(&table());
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "id      username");
        assert_eq!(lines[1], "──────  ────────");
        assert_eq!(lines[2], "7       alice");
        // Null prints as an empty cell.
        assert_eq!(lines[3], "123456");
    }

    #[test]
    fn test_long_cells_are_cut() {
        let mut record = Record::new();
        record.insert("video_description", "a very long description indeed");
        let table = Table::from_records([record]);

        let formatter = TextFormatter::new(false).with_max_cell_width(10);
        let output = formatter.format_table(&table);
        let last = output.lines().last().unwrap();

        assert_eq!(last, "a very lo…");
        assert_eq!(last.chars().count(), 10);
    }

    #[test]
    fn test_newlines_do_not_break_rows() {
        let mut record = Record::new();
        record.insert("text", "first\nsecond");
        let table = Table::from_records([record]);

        let output = TextFormatter::new(false).format_table(&table);

        assert_eq!(output.lines().count(), 3);
        assert!(output.contains("first second"));
    }

    #[test]
    fn test_header_is_bold_with_colors() {
        let output = TextFormatter::new(true).format_table(&table());
        assert!(output.starts_with("\x1b[1m"));
    }

    #[test]
    fn test_no_ansi_without_colors() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_table(&table());
        assert!(!output.contains("\x1b["));
        let failure = formatter.format_failure("followers of alice", "boom");
        assert_eq!(failure, "✗ followers of alice: boom");
    }

    #[test]
    fn test_failure_is_red_with_colors() {
        let failure = TextFormatter::new(true).format_failure("q", "boom");
        assert!(failure.contains("\x1b[31m"));
    }

    #[test]
    fn test_summary() {
        let formatter = TextFormatter::new(false);

        let ok = formatter.format_summary(1, 1, 0, 1, Duration::from_millis(1500));
        assert_eq!(ok, "✓ 1 row from 1 query in 1 request (1.5s)");

        let partial = formatter.format_summary(250, 3, 1, 7, Duration::from_secs(2));
        assert_eq!(partial, "! 250 rows from 3 queries in 7 requests (2.0s), 1 failed");
    }

    #[test]
    fn test_interrupted() {
        let formatter = TextFormatter::new(false);
        assert_eq!(
            formatter.format_interrupted("videos", 1),
            "! videos: interrupted after 1 row"
        );
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::JsonFormatter;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tikresearch_core::Endpoint;
    use tikresearch_fetch::{Credential, FetchError, FetchOutcome, RequestContext};

    fn outcome(error: Option<FetchError>) -> FetchOutcome {
        FetchOutcome {
            query: "followers of alice".into(),
            endpoint: Endpoint::Followers,
            columns: vec!["target_account".into(), "username".into()],
            pages: Vec::new(),
            error,
            requests: 3,
            duration: Duration::from_millis(1234),
        }
    }

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_credential_hides_token() {
        let credential = Credential {
            access_token: "clt.secret-token-value".into(),
            token_type: "Bearer".into(),
            expires_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            scope: None,
        };

        let output = JsonFormatter::new(false)
            .format_credential(&credential)
            .unwrap();

        assert!(!output.contains("secret-token-value"));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["token"], "clt.****");
        assert!(parsed.get("scope").is_none());
    }

    #[test]
    fn test_outcome_ok() {
        let output = JsonFormatter::new(false)
            .format_outcome(&outcome(None))
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["endpoint"], "followers");
        assert_eq!(parsed["records"], 0);
        assert_eq!(parsed["requests"], 3);
        assert_eq!(parsed["seconds"], 1.234);
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_outcome_interrupted() {
        let error = FetchError::Cancelled {
            context: RequestContext::new("followers", serde_json::json!({}), 1),
        };
        let output = JsonFormatter::new(false)
            .format_outcome(&outcome(Some(error)))
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["status"], "interrupted");
        assert!(parsed["error"].as_str().unwrap().starts_with("Cancelled"));
    }
}

#[cfg(test)]
mod format_selection_tests {
    use super::super::{export_format, resolve_format};
    use crate::OutputFormat;
    use std::path::Path;
    use tikresearch_store::ExportFormat;

    #[test]
    fn test_explicit_format_wins() {
        let format = resolve_format(Some(OutputFormat::Json), Some(Path::new("out.csv")));
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            resolve_format(None, Some(Path::new("out/videos.csv"))),
            OutputFormat::Csv
        );
        assert_eq!(
            resolve_format(None, Some(Path::new("rows.ndjson"))),
            OutputFormat::Jsonl
        );
        assert_eq!(resolve_format(None, Some(Path::new("notes.txt"))), OutputFormat::Text);
        assert_eq!(resolve_format(None, None), OutputFormat::Text);
    }

    #[test]
    fn test_export_format_mapping() {
        assert_eq!(export_format(OutputFormat::Text), None);
        assert_eq!(export_format(OutputFormat::Jsonl), Some(ExportFormat::JsonLines));
    }
}
