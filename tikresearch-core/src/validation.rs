//! Query and record validation.
//!
//! [`Query::validate`] runs before any request is made and reports every
//! violated constraint at once. [`Schema::validate`] checks normalized
//! records and stops at the first offending field.

use std::str::FromStr;

use crate::error::{CoreError, Violation};
use crate::models::query::parse_date;
use crate::models::{
    is_known_region, Condition, Endpoint, FieldName, Operation, Query, Record, Target, Value,
    VideoLength, MAX_PAGE_SIZE,
};

// ============================================================================
// Query Validation
// ============================================================================

impl Query {
    /// Checks the query against every constraint and returns what failed.
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();

        match self.target() {
            Target::Videos {
                filter,
                start_date,
                end_date,
                ..
            } => {
                if filter.is_empty() {
                    out.push(Violation::new("query", "needs at least one condition"));
                }
                for (clause, index, condition) in filter.clauses() {
                    check_condition(&format!("query.{clause}[{index}]"), condition, &mut out);
                }
                if start_date > end_date {
                    out.push(Violation::new(
                        "start_date",
                        format!("{start_date} is after end_date {end_date}"),
                    ));
                }
            }
            Target::Comments { video_id } => {
                if video_id.trim().is_empty() {
                    out.push(Violation::new("video_id", "must not be empty"));
                } else if !is_numeric_id(video_id) {
                    out.push(Violation::new(
                        "video_id",
                        format!("'{video_id}' is not a numeric id"),
                    ));
                }
            }
            other => {
                if other.username().is_none_or(|u| u.trim().is_empty()) {
                    out.push(Violation::new("username", "must not be empty"));
                }
            }
        }

        if self.max_count() == 0 || self.max_count() > MAX_PAGE_SIZE {
            out.push(Violation::new(
                "max_count",
                format!("must be between 1 and {MAX_PAGE_SIZE}, got {}", self.max_count()),
            ));
        }

        if self.limit() == Some(0) {
            out.push(Violation::new("limit", "must be greater than 0"));
        }

        let endpoint = self.endpoint();
        for (i, field) in self.explicit_fields().iter().enumerate() {
            if !endpoint.known_fields().contains(&field.as_str()) {
                out.push(Violation::new(
                    format!("fields[{i}]"),
                    format!("'{field}' is not a field of {endpoint}"),
                ));
            }
        }

        out
    }

    /// Validates the query.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidQuery` listing every violated constraint.
    pub fn validate(&self) -> Result<(), CoreError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidQuery { violations })
        }
    }
}

fn check_condition(path: &str, condition: &Condition, out: &mut Vec<Violation>) {
    let values_path = format!("{path}.field_values");
    let count = condition.field_values.len();

    match condition.operation {
        Operation::In if count == 0 => {
            out.push(Violation::new(&values_path, "IN needs at least one value"));
        }
        Operation::In => {}
        op if count != 1 => {
            out.push(Violation::new(
                &values_path,
                format!("{op} takes exactly one value, got {count}"),
            ));
        }
        _ => {}
    }

    if condition.operation.is_ordering() && condition.field_name != FieldName::CreateDate {
        out.push(Violation::new(
            format!("{path}.operation"),
            format!(
                "{} is only allowed on create_date, not {}",
                condition.operation, condition.field_name
            ),
        ));
    }

    for (i, value) in condition.field_values.iter().enumerate() {
        let value_path = format!("{values_path}[{i}]");
        if value.trim().is_empty() {
            out.push(Violation::new(value_path, "must not be empty"));
            continue;
        }
        let problem = match condition.field_name {
            FieldName::CreateDate if parse_date(value).is_none() => {
                Some(format!("'{value}' is not a YYYYMMDD date"))
            }
            FieldName::RegionCode if !is_known_region(value) => {
                Some(format!("'{value}' is not a known region code"))
            }
            FieldName::VideoLength if VideoLength::from_str(value).is_err() => Some(format!(
                "'{value}' is not one of SHORT, MID, LONG, EXTRA_LONG"
            )),
            FieldName::VideoId if !is_numeric_id(value) => {
                Some(format!("'{value}' is not a numeric id"))
            }
            _ => None,
        };
        if let Some(message) = problem {
            out.push(Violation::new(value_path, message));
        }
    }
}

fn is_numeric_id(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// Record Schemas
// ============================================================================

/// Expected type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Numeric id, as an integer or a string of digits.
    Id,
    /// Integer.
    Integer,
    /// Integer or float.
    Number,
    /// Text.
    Text,
    /// Boolean.
    Bool,
    /// List of scalars.
    List,
    /// Anything.
    Any,
}

impl FieldType {
    /// Name used in schema errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Text => "text",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Any => "any",
        }
    }

    /// Whether a non-null value has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _)
            | (Self::Id | Self::Integer | Self::Number, Value::Int(_))
            | (Self::Number, Value::Float(_))
            | (Self::Text, Value::Text(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::List, Value::List(_)) => true,
            (Self::Id, Value::Text(s)) => is_numeric_id(s),
            // ids above i64::MAX arrive as floats
            (Self::Id, Value::Float(f)) => f.fract() == 0.0 && *f > 0.0,
            _ => false,
        }
    }
}

/// One field of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: &'static str,
    /// Expected type.
    pub ty: FieldType,
    /// Must be present and non-null.
    pub required: bool,
}

impl FieldSpec {
    const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }

    const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }
}

/// The shape of a normalized record from one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    endpoint: Endpoint,
    fields: Vec<FieldSpec>,
}

fn field_type(name: &str) -> FieldType {
    use FieldType::{Any, Bool, Id, Integer, List, Number, Text};
    match name {
        "id" | "video_id" | "music_id" | "playlist_id" | "parent_comment_id" => Id,
        "create_time" | "share_count" | "view_count" | "like_count" | "comment_count"
        | "favorites_count" | "reply_count" | "follower_count" | "following_count"
        | "likes_count" | "video_count" => Integer,
        "video_duration" => Number,
        "is_stem_verified" | "is_verified" => Bool,
        "hashtag_names" | "effect_ids" => List,
        "video_description" | "region_code" | "username" | "voice_to_text" | "display_name"
        | "bio_description" | "avatar_url" | "bio_url" | "text" | "target_account" => Text,
        _ => Any,
    }
}

impl Schema {
    /// Schema for records returned by `endpoint`, including the context
    /// column the fetcher stamps on them.
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        let required = match endpoint {
            Endpoint::UserInfo | Endpoint::Followers | Endpoint::Following => "username",
            _ => "id",
        };

        let mut fields: Vec<FieldSpec> = endpoint
            .known_fields()
            .iter()
            .map(|name| {
                if *name == required {
                    FieldSpec::required(name, field_type(name))
                } else {
                    FieldSpec::optional(name, field_type(name))
                }
            })
            .collect();

        match endpoint {
            Endpoint::UserInfo => fields.push(FieldSpec::required("username", FieldType::Text)),
            Endpoint::VideoQuery | Endpoint::Comments => {}
            _ => fields.push(FieldSpec::optional("target_account", FieldType::Text)),
        }

        Self { endpoint, fields }
    }

    /// Schema for records of `query`.
    ///
    /// A key field is only required when the query asks for it or stamps
    /// it as a context column; the server omits fields nobody requested.
    pub fn for_query(query: &Query) -> Self {
        let mut columns: Vec<String> = query
            .context_columns()
            .into_iter()
            .map(|(column, _)| column)
            .collect();
        columns.extend(query.fields());
        Self::for_columns(query.endpoint(), &columns)
    }

    /// Schema for `endpoint` records that carry only `columns`. Required
    /// fields outside `columns` become optional; types are still checked.
    pub fn for_columns(endpoint: Endpoint, columns: &[String]) -> Self {
        let mut schema = Self::for_endpoint(endpoint);
        for spec in &mut schema.fields {
            if spec.required && !columns.iter().any(|c| c == spec.name) {
                spec.required = false;
            }
        }
        schema
    }

    /// Endpoint the schema describes.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Field specs.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Checks one record. Fields the schema does not know are accepted.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` for the first field that is missing
    /// while required, or holds a value of the wrong type.
    pub fn validate(&self, record: &Record) -> Result<(), CoreError> {
        for spec in &self.fields {
            match record.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(CoreError::Schema {
                        field: spec.name.to_string(),
                        expected: format!("non-null {}", spec.ty.name()),
                        found: "null".to_string(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.ty.accepts(value) => {
                    return Err(CoreError::Schema {
                        field: spec.name.to_string(),
                        expected: spec.ty.name().to_string(),
                        found: value.type_name().to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Checks every record.
    ///
    /// # Errors
    ///
    /// Returns the first `CoreError::Schema` found.
    pub fn validate_all<'a>(
        &self,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Result<(), CoreError> {
        for (i, record) in records.into_iter().enumerate() {
            self.validate(record).inspect_err(|e| {
                tracing::debug!(endpoint = %self.endpoint, row = i, error = %e, "record failed schema");
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Filter;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn paths(query: &Query) -> Vec<String> {
        query.violations().into_iter().map(|v| v.path).collect()
    }

    #[test]
    fn test_valid_video_query() {
        let query = Query::videos(
            Filter::hashtags(["germany"], Some("DE"), None, None),
            date("20240101"),
            date("20240131"),
        );
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_every_violation_is_listed() {
        let filter = Filter::new()
            .and(Condition::new(FieldName::RegionCode, Operation::Eq, ["DE", "FR"]))
            .and(Condition::eq(FieldName::RegionCode, "XX"))
            .or(Condition::eq(FieldName::Username, "alice"))
            .not(Condition::new(FieldName::Keyword, Operation::Gt, ["cats"]));
        let query = Query::videos(filter, date("20240201"), date("20240101"))
            .with_max_count(0)
            .with_limit(0)
            .with_fields(["id", "nonsense"]);

        let err = query.validate().unwrap_err();
        let got: Vec<&str> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            got,
            vec![
                "query.and[0].field_values",
                "query.and[1].field_values[0]",
                "query.not[0].operation",
                "start_date",
                "max_count",
                "limit",
                "fields[1]",
            ]
        );
    }

    #[test]
    fn test_empty_video_query() {
        let query = Query::videos(Filter::new(), date("20240101"), date("20240101"));
        assert_eq!(paths(&query), vec!["query"]);
    }

    #[test]
    fn test_in_needs_values_and_values_must_not_be_empty() {
        let filter = Filter::new()
            .and(Condition::is_in(FieldName::HashtagName, Vec::<String>::new()))
            .and(Condition::is_in(FieldName::Keyword, ["", "x"]));
        let query = Query::videos(filter, date("20240101"), date("20240101"));
        assert_eq!(
            paths(&query),
            vec!["query.and[0].field_values", "query.and[1].field_values[0]"]
        );
    }

    #[test]
    fn test_create_date_ranges() {
        let filter = Filter::new()
            .and(Condition::new(FieldName::CreateDate, Operation::Gte, ["20240105"]))
            .and(Condition::new(FieldName::CreateDate, Operation::Lt, ["2024-01-10"]));
        let query = Query::videos(filter, date("20240101"), date("20240131"));
        assert_eq!(paths(&query), vec!["query.and[1].field_values[0]"]);
    }

    #[test]
    fn test_video_length_and_video_id_values() {
        let filter = Filter::new()
            .and(Condition::is_in(FieldName::VideoLength, ["SHORT", "TINY"]))
            .and(Condition::eq(FieldName::VideoId, "abc"));
        let query = Query::videos(filter, date("20240101"), date("20240101"));
        assert_eq!(
            paths(&query),
            vec!["query.and[0].field_values[1]", "query.and[1].field_values[0]"]
        );
    }

    #[test]
    fn test_user_and_comment_targets() {
        assert_eq!(paths(&Query::followers("  ")), vec!["username"]);
        assert_eq!(paths(&Query::comments("")), vec!["video_id"]);
        assert_eq!(paths(&Query::comments("12ab")), vec!["video_id"]);
        assert!(Query::comments("7234567890123").validate().is_ok());
        assert!(Query::user_info("alice").validate().is_ok());
    }

    #[test]
    fn test_fields_must_belong_to_endpoint() {
        let query = Query::user_info("alice").with_fields(["display_name", "like_count"]);
        let err = query.validate().unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert!(err.violations()[0].message.contains("like_count"));
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_schema_accepts_video_record() {
        let schema = Schema::for_endpoint(Endpoint::VideoQuery);
        let rec = record(&[
            ("id", Value::Int(7_301_234_567_890_123)),
            ("like_count", Value::Int(3)),
            ("hashtag_names", Value::List(vec![Value::from("a")])),
            ("voice_to_text", Value::Null),
            ("video_label.content", Value::from("ad")),
        ]);
        assert!(schema.validate(&rec).is_ok());
    }

    #[test]
    fn test_schema_reports_wrong_type() {
        let schema = Schema::for_endpoint(Endpoint::VideoQuery);
        let rec = record(&[("id", Value::from("123")), ("view_count", Value::from("many"))]);
        match schema.validate(&rec).unwrap_err() {
            CoreError::Schema {
                field,
                expected,
                found,
            } => {
                assert_eq!(field, "view_count");
                assert_eq!(expected, "integer");
                assert_eq!(found, "text");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_schema_requires_key_field() {
        let schema = Schema::for_endpoint(Endpoint::Followers);
        let rec = record(&[("display_name", Value::from("A")), ("username", Value::Null)]);
        let err = schema.validate(&rec).unwrap_err();
        assert!(err.to_string().contains("'username'"));

        let ok = record(&[("username", Value::from("a")), ("target_account", Value::from("b"))]);
        assert!(schema.validate_all([&ok, &ok]).is_ok());
    }

    #[test]
    fn test_key_field_optional_when_not_requested() {
        let query = Query::videos(
            Filter::usernames(["alice"]),
            date("20240101"),
            date("20240102"),
        )
        .with_fields(["like_count", "view_count"]);
        assert!(query.validate().is_ok());

        let schema = Schema::for_query(&query);
        let rec = record(&[("like_count", Value::Int(3)), ("view_count", Value::Int(9))]);
        assert!(schema.validate(&rec).is_ok());

        // Types are still checked.
        let bad = record(&[("like_count", Value::from("lots"))]);
        assert!(schema.validate(&bad).is_err());

        // Asking for the key makes it required again.
        let with_id = Schema::for_query(&query.clone().with_fields(["id", "like_count"]));
        let err = with_id.validate(&rec).unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_context_column_stays_required() {
        let query = Query::user_info("alice").with_fields(["display_name"]);
        let schema = Schema::for_query(&query);

        let missing = record(&[("display_name", Value::from("A"))]);
        assert!(schema.validate(&missing).is_err());

        let stamped = record(&[("display_name", Value::from("A")), ("username", Value::from("alice"))]);
        assert!(schema.validate(&stamped).is_ok());
    }
}
