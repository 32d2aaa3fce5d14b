//! Query model.
//!
//! A [`Query`] describes one request stream against one endpoint. It is
//! built up front with the `with_*` methods and is not changed once it is
//! handed to the fetcher.
//!
//! Video queries carry a boolean [`Filter`] made of [`Condition`]s:
//!
//! ```json
//! {
//!   "and": [
//!     {"operation": "IN", "field_name": "hashtag_name", "field_values": ["germany"]},
//!     {"operation": "EQ", "field_name": "region_code", "field_values": ["DE"]}
//!   ]
//! }
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;

use super::endpoint::Endpoint;
use super::page::Cursor;
use crate::error::{CoreError, Violation};

/// Wire format of Research API dates.
pub const API_DATE_FORMAT: &str = "%Y%m%d";

/// Largest page size the API serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest date range (in days) a single video query may span.
pub const MAX_WINDOW_DAYS: u32 = 30;

/// Parses a `YYYYMMDD` date.
///
/// # Errors
///
/// Returns `CoreError::InvalidQuery` naming `path` if the text is not a
/// valid date.
pub fn parse_api_date(path: &str, text: &str) -> Result<NaiveDate, CoreError> {
    parse_date(text).ok_or_else(|| CoreError::InvalidQuery {
        violations: vec![Violation::new(
            path,
            format!("'{text}' is not a YYYYMMDD date"),
        )],
    })
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(text, API_DATE_FORMAT).ok()
}

/// Formats a date the way the API expects it.
pub fn format_api_date(date: NaiveDate) -> String {
    date.format(API_DATE_FORMAT).to_string()
}

// ============================================================================
// Conditions
// ============================================================================

/// Fields a video query condition can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    /// Creation date, `YYYYMMDD`.
    CreateDate,
    /// Author handle.
    Username,
    /// Two-letter region code.
    RegionCode,
    /// Numeric video id.
    VideoId,
    /// Hashtag without the leading `#`.
    HashtagName,
    /// Keyword in the description.
    Keyword,
    /// Music id.
    MusicId,
    /// Effect id.
    EffectId,
    /// Duration bucket.
    VideoLength,
}

impl FieldName {
    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDate => "create_date",
            Self::Username => "username",
            Self::RegionCode => "region_code",
            Self::VideoId => "video_id",
            Self::HashtagName => "hashtag_name",
            Self::Keyword => "keyword",
            Self::MusicId => "music_id",
            Self::EffectId => "effect_id",
            Self::VideoLength => "video_length",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// Equal to the single value.
    Eq,
    /// Equal to any of the values.
    In,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl Operation {
    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::In => "IN",
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Lt => "LT",
            Self::Lte => "LTE",
        }
    }

    /// True for GT, GTE, LT and LTE.
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single test in a video query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Field to test.
    pub field_name: FieldName,
    /// Operator.
    pub operation: Operation,
    /// Values to compare against.
    pub field_values: Vec<String>,
}

impl Condition {
    /// Creates a condition.
    pub fn new<I, S>(field_name: FieldName, operation: Operation, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_name,
            operation,
            field_values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `field EQ value`.
    pub fn eq(field_name: FieldName, value: impl Into<String>) -> Self {
        Self::new(field_name, Operation::Eq, [value.into()])
    }

    /// `field IN values`.
    pub fn is_in<I, S>(field_name: FieldName, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(field_name, Operation::In, values)
    }
}

/// Boolean combination of conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// All must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<Condition>,
    /// At least one must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<Condition>,
    /// None may hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not: Vec<Condition>,
}

impl Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an `and` condition.
    pub fn and(mut self, condition: Condition) -> Self {
        self.and.push(condition);
        self
    }

    /// Adds an `or` condition.
    pub fn or(mut self, condition: Condition) -> Self {
        self.or.push(condition);
        self
    }

    /// Adds a `not` condition.
    pub fn not(mut self, condition: Condition) -> Self {
        self.not.push(condition);
        self
    }

    /// Returns true if there are no conditions at all.
    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.is_empty() && self.not.is_empty()
    }

    /// Iterates over `(clause name, index, condition)`.
    pub fn clauses(&self) -> impl Iterator<Item = (&'static str, usize, &Condition)> {
        let and = self.and.iter().enumerate().map(|(i, c)| ("and", i, c));
        let or = self.or.iter().enumerate().map(|(i, c)| ("or", i, c));
        let not = self.not.iter().enumerate().map(|(i, c)| ("not", i, c));
        and.chain(or).chain(not)
    }

    /// Filter for videos carrying any of the hashtags, with optional
    /// region, music and effect restrictions.
    pub fn hashtags<I, S>(
        hashtags: I,
        region_code: Option<&str>,
        music_id: Option<&str>,
        effect_id: Option<&str>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::new().and(Condition::is_in(FieldName::HashtagName, hashtags));
        if let Some(region) = region_code {
            filter = filter.and(Condition::eq(FieldName::RegionCode, region));
        }
        if let Some(music) = music_id {
            filter = filter.and(Condition::eq(FieldName::MusicId, music));
        }
        if let Some(effect) = effect_id {
            filter = filter.and(Condition::eq(FieldName::EffectId, effect));
        }
        filter
    }

    /// Filter for videos posted by any of the users.
    pub fn usernames<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().and(Condition::is_in(FieldName::Username, usernames))
    }
}

// ============================================================================
// Query
// ============================================================================

/// What a query asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Videos matching a filter in a date range.
    Videos {
        /// Conditions.
        filter: Filter,
        /// First day, inclusive.
        start_date: NaiveDate,
        /// Last day, inclusive.
        end_date: NaiveDate,
        /// Ask the API for a random sample.
        #[serde(default)]
        is_random: bool,
    },
    /// Profile of one user.
    UserInfo {
        /// Handle.
        username: String,
    },
    /// Videos a user liked.
    LikedVideos {
        /// Handle.
        username: String,
    },
    /// Videos a user reposted.
    RepostedVideos {
        /// Handle.
        username: String,
    },
    /// Videos a user pinned.
    PinnedVideos {
        /// Handle.
        username: String,
    },
    /// Accounts following a user.
    Followers {
        /// Handle.
        username: String,
    },
    /// Accounts a user follows.
    Following {
        /// Handle.
        username: String,
    },
    /// Comments on a video.
    Comments {
        /// Numeric video id.
        video_id: String,
    },
}

impl Target {
    /// Endpoint this target is served by.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Videos { .. } => Endpoint::VideoQuery,
            Self::UserInfo { .. } => Endpoint::UserInfo,
            Self::LikedVideos { .. } => Endpoint::LikedVideos,
            Self::RepostedVideos { .. } => Endpoint::RepostedVideos,
            Self::PinnedVideos { .. } => Endpoint::PinnedVideos,
            Self::Followers { .. } => Endpoint::Followers,
            Self::Following { .. } => Endpoint::Following,
            Self::Comments { .. } => Endpoint::Comments,
        }
    }

    /// The username for user-scoped targets.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UserInfo { username }
            | Self::LikedVideos { username }
            | Self::RepostedVideos { username }
            | Self::PinnedVideos { username }
            | Self::Followers { username }
            | Self::Following { username } => Some(username),
            _ => None,
        }
    }
}

/// A validated-on-submit request stream against one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    target: Target,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default = "default_max_count")]
    max_count: u32,
    #[serde(default)]
    limit: Option<usize>,
}

fn default_max_count() -> u32 {
    MAX_PAGE_SIZE
}

impl Query {
    /// Creates a query for a target with default fields and page size.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            fields: Vec::new(),
            max_count: MAX_PAGE_SIZE,
            limit: None,
        }
    }

    /// Videos matching `filter` between two dates (inclusive).
    pub fn videos(filter: Filter, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self::new(Target::Videos {
            filter,
            start_date,
            end_date,
            is_random: false,
        })
    }

    /// Profile of `username`.
    pub fn user_info(username: impl Into<String>) -> Self {
        Self::new(Target::UserInfo {
            username: username.into(),
        })
    }

    /// Videos liked by `username`.
    pub fn liked_videos(username: impl Into<String>) -> Self {
        Self::new(Target::LikedVideos {
            username: username.into(),
        })
    }

    /// Videos reposted by `username`.
    pub fn reposted_videos(username: impl Into<String>) -> Self {
        Self::new(Target::RepostedVideos {
            username: username.into(),
        })
    }

    /// Videos pinned by `username`.
    pub fn pinned_videos(username: impl Into<String>) -> Self {
        Self::new(Target::PinnedVideos {
            username: username.into(),
        })
    }

    /// Followers of `username`.
    pub fn followers(username: impl Into<String>) -> Self {
        Self::new(Target::Followers {
            username: username.into(),
        })
    }

    /// Accounts `username` follows.
    pub fn following(username: impl Into<String>) -> Self {
        Self::new(Target::Following {
            username: username.into(),
        })
    }

    /// Comments on `video_id`.
    pub fn comments(video_id: impl Into<String>) -> Self {
        Self::new(Target::Comments {
            video_id: video_id.into(),
        })
    }

    /// Requests specific fields instead of the endpoint defaults.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    /// Caps the total number of records across all pages.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Asks for a random sample (video queries only; ignored elsewhere).
    #[must_use]
    pub fn with_random(mut self, random: bool) -> Self {
        if let Target::Videos { is_random, .. } = &mut self.target {
            *is_random = random;
        }
        self
    }

    /// What is being asked for.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Endpoint this query goes to.
    pub fn endpoint(&self) -> Endpoint {
        self.target.endpoint()
    }

    /// Requested fields, falling back to the endpoint defaults.
    pub fn fields(&self) -> Vec<String> {
        if self.fields.is_empty() {
            self.endpoint()
                .default_fields()
                .iter()
                .map(|f| (*f).to_string())
                .collect()
        } else {
            self.fields.clone()
        }
    }

    /// Fields the caller chose explicitly.
    pub fn explicit_fields(&self) -> &[String] {
        &self.fields
    }

    /// Page size.
    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    /// Total record cap.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Columns stamped on every record so rows stay attributable after
    /// results from several queries are merged.
    pub fn context_columns(&self) -> Vec<(String, JsonValue)> {
        match &self.target {
            Target::Videos { .. } => Vec::new(),
            Target::UserInfo { username } => {
                vec![("username".to_string(), JsonValue::from(username.as_str()))]
            }
            Target::LikedVideos { username }
            | Target::RepostedVideos { username }
            | Target::PinnedVideos { username }
            | Target::Followers { username }
            | Target::Following { username } => vec![(
                "target_account".to_string(),
                JsonValue::from(username.as_str()),
            )],
            Target::Comments { video_id } => {
                vec![("video_id".to_string(), video_id_json(video_id))]
            }
        }
    }

    /// Builds the JSON body for one request.
    ///
    /// `page_size` is the `max_count` for this request (it may be smaller
    /// than the query's page size when a limit is close). The cursor, if
    /// any, is merged in verbatim.
    pub fn request_body(&self, cursor: Option<&Cursor>, page_size: u32) -> JsonValue {
        let mut body = Map::new();
        match &self.target {
            Target::Videos {
                filter,
                start_date,
                end_date,
                is_random,
            } => {
                body.insert("query".into(), json!(filter));
                body.insert("start_date".into(), json!(format_api_date(*start_date)));
                body.insert("end_date".into(), json!(format_api_date(*end_date)));
                body.insert("max_count".into(), json!(page_size));
                if *is_random {
                    body.insert("is_random".into(), json!(true));
                }
            }
            Target::UserInfo { username } | Target::PinnedVideos { username } => {
                body.insert("username".into(), json!(username));
            }
            Target::LikedVideos { username }
            | Target::RepostedVideos { username }
            | Target::Followers { username }
            | Target::Following { username } => {
                body.insert("username".into(), json!(username));
                body.insert("max_count".into(), json!(page_size));
            }
            Target::Comments { video_id } => {
                body.insert("video_id".into(), video_id_json(video_id));
                body.insert("max_count".into(), json!(page_size));
            }
        }
        if let Some(cursor) = cursor {
            cursor.apply(&mut body);
        }
        JsonValue::Object(body)
    }

    /// Splits a video query into consecutive windows no longer than
    /// `max_days`. Other queries come back unchanged.
    ///
    /// The limit of the original query is copied to every window; the
    /// fetcher enforces it across the whole run.
    pub fn windows(&self, max_days: u32) -> Vec<Query> {
        let Target::Videos {
            filter,
            start_date,
            end_date,
            is_random,
        } = &self.target
        else {
            return vec![self.clone()];
        };

        let span = Duration::days(i64::from(max_days.max(1)));
        let mut windows = Vec::new();
        let mut start = *start_date;
        while start <= *end_date {
            let end = (start + span).min(*end_date);
            windows.push(Query {
                target: Target::Videos {
                    filter: filter.clone(),
                    start_date: start,
                    end_date: end,
                    is_random: *is_random,
                },
                ..self.clone()
            });
            start = end + Duration::days(1);
        }
        if windows.is_empty() {
            // start after end: keep it whole so validation reports it
            windows.push(self.clone());
        }
        windows
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match &self.target {
            Target::Videos {
                start_date,
                end_date,
                ..
            } => format!(
                "{} {}..{}",
                self.endpoint(),
                format_api_date(*start_date),
                format_api_date(*end_date)
            ),
            Target::Comments { video_id } => format!("{} video_id={video_id}", self.endpoint()),
            other => format!(
                "{} username={}",
                self.endpoint(),
                other.username().unwrap_or_default()
            ),
        }
    }
}

fn video_id_json(video_id: &str) -> JsonValue {
    video_id
        .parse::<u64>()
        .map_or_else(|_| JsonValue::from(video_id), JsonValue::from)
}
