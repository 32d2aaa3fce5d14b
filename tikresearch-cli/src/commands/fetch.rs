//! Fetch commands - videos, user lists and comments.
//!
//! Every target becomes one query. Queries run concurrently; a failed
//! target is reported and skipped, the rest are written.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tikresearch_core::{parse_api_date, Condition, FieldName, Filter, Query, Table};
use tikresearch_fetch::FetchOutcome;
use tikresearch_store::Settings;
use tracing::{debug, info, warn};

use crate::commands::{build_client, load_settings};
use crate::output::{self, JsonFormatter, TextFormatter};
use crate::shutdown::ShutdownCoordinator;
use crate::{Cli, ExitCode};

// ============================================================================
// Arguments
// ============================================================================

/// Options shared by every fetch command.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Fields to request (comma-separated; default: the endpoint's standard fields).
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Stop after this many rows per target.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Rows per request, 1-100 (default: from the config file).
    #[arg(long)]
    pub max_count: Option<u32>,

    /// Skip the per-row type check.
    #[arg(long)]
    pub no_validate: bool,

    /// Print a JSON report per target on stderr.
    #[arg(long)]
    pub report: bool,
}

/// Arguments for the videos command.
#[derive(Args, Debug, Clone, Default)]
pub struct VideosArgs {
    /// JSON file holding a filter: {"and": [...], "or": [...], "not": [...]}.
    #[arg(long, value_name = "FILE")]
    pub query: Option<PathBuf>,

    /// Hashtags, any of which must match (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub hashtag: Vec<String>,

    /// Authors, any of which must match (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub username: Vec<String>,

    /// Keywords, any of which must match (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub keyword: Vec<String>,

    /// Region codes, any of which must match (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub region: Vec<String>,

    /// Music id.
    #[arg(long)]
    pub music_id: Option<String>,

    /// Effect id.
    #[arg(long)]
    pub effect_id: Option<String>,

    /// First day, YYYYMMDD.
    #[arg(long)]
    pub start: String,

    /// Last day, YYYYMMDD. Ranges longer than 30 days are split.
    #[arg(long)]
    pub end: String,

    /// Ask for a random sample.
    #[arg(long)]
    pub random: bool,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Arguments for the user list commands.
#[derive(Args, Debug, Clone, Default)]
pub struct UsersArgs {
    /// Usernames, one query each.
    #[arg(required = true, num_args = 1..)]
    pub usernames: Vec<String>,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Arguments for the comments command.
#[derive(Args, Debug, Clone, Default)]
pub struct CommentsArgs {
    /// Video ids, one query each.
    #[arg(required = true, num_args = 1..)]
    pub video_ids: Vec<String>,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Per-user endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserList {
    /// Profile information.
    Info,
    /// Liked videos.
    Liked,
    /// Reposted videos.
    Reposted,
    /// Pinned videos.
    Pinned,
    /// Followers.
    Followers,
    /// Accounts followed.
    Following,
}

impl UserList {
    /// Query for one user.
    pub fn query(self, username: &str) -> Query {
        match self {
            Self::Info => Query::user_info(username),
            Self::Liked => Query::liked_videos(username),
            Self::Reposted => Query::reposted_videos(username),
            Self::Pinned => Query::pinned_videos(username),
            Self::Followers => Query::followers(username),
            Self::Following => Query::following(username),
        }
    }
}

impl FetchArgs {
    /// Applies fields, page size and limit to a query.
    pub fn apply(&self, query: Query, settings: &Settings) -> Query {
        let mut query = query.with_max_count(self.max_count.unwrap_or(settings.paging.max_count));
        if !self.fields.is_empty() {
            query = query.with_fields(self.fields.iter().map(|f| f.trim().to_string()));
        }
        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        query
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Runs the videos command.
pub async fn run_videos(
    args: &VideosArgs,
    cli: &Cli,
    shutdown: &ShutdownCoordinator,
) -> Result<ExitCode> {
    let base = match &args.query {
        Some(path) => read_filter(path).await?,
        None => Filter::new(),
    };
    let filter = filter_from_flags(base, args);
    let start = parse_api_date("start_date", &args.start)?;
    let end = parse_api_date("end_date", &args.end)?;

    let settings = load_settings(cli).await?;
    let query = args
        .fetch
        .apply(Query::videos(filter, start, end), &settings)
        .with_random(args.random);
    // Surface every problem before any credentials are needed.
    query.validate()?;

    run_queries(vec![query], &args.fetch, &settings, cli, shutdown).await
}

/// Runs one of the per-user commands.
pub async fn run_users(
    list: UserList,
    args: &UsersArgs,
    cli: &Cli,
    shutdown: &ShutdownCoordinator,
) -> Result<ExitCode> {
    let settings = load_settings(cli).await?;
    let queries = args
        .usernames
        .iter()
        .map(|username| args.fetch.apply(list.query(username), &settings))
        .collect();
    run_queries(queries, &args.fetch, &settings, cli, shutdown).await
}

/// Runs the comments command.
pub async fn run_comments(
    args: &CommentsArgs,
    cli: &Cli,
    shutdown: &ShutdownCoordinator,
) -> Result<ExitCode> {
    let settings = load_settings(cli).await?;
    let queries = args
        .video_ids
        .iter()
        .map(|id| args.fetch.apply(Query::comments(id), &settings))
        .collect();
    run_queries(queries, &args.fetch, &settings, cli, shutdown).await
}

// ============================================================================
// Helpers
// ============================================================================

/// Reads a filter from a JSON file.
async fn read_filter(path: &Path) -> Result<Filter> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let filter = serde_json::from_str(&text)
        .with_context(|| format!("parsing filter in {}", path.display()))?;
    Ok(filter)
}

/// Adds one `and` condition per filter flag given.
pub fn filter_from_flags(mut filter: Filter, args: &VideosArgs) -> Filter {
    let lists = [
        (FieldName::HashtagName, &args.hashtag),
        (FieldName::Username, &args.username),
        (FieldName::Keyword, &args.keyword),
        (FieldName::RegionCode, &args.region),
    ];
    for (field, values) in lists {
        let values: Vec<&str> = values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();
        match values.as_slice() {
            [] => {}
            [single] => filter = filter.and(Condition::eq(field, *single)),
            many => filter = filter.and(Condition::is_in(field, many.iter().copied())),
        }
    }
    if let Some(music) = &args.music_id {
        filter = filter.and(Condition::eq(FieldName::MusicId, music.as_str()));
    }
    if let Some(effect) = &args.effect_id {
        filter = filter.and(Condition::eq(FieldName::EffectId, effect.as_str()));
    }
    filter
}

/// Collects every query, reports failures, and writes the merged table.
async fn run_queries(
    queries: Vec<Query>,
    args: &FetchArgs,
    settings: &Settings,
    cli: &Cli,
    shutdown: &ShutdownCoordinator,
) -> Result<ExitCode> {
    let started = Instant::now();
    let client = build_client(settings, shutdown.cancel_token())?;
    let total = queries.len();

    info!(queries = total, "Fetching");
    let outcomes = client.collect_many(queries).await;

    let merged = merge_outcomes(&outcomes, !args.no_validate);
    let requests: u32 = outcomes.iter().map(|o| o.requests).sum();

    if !cli.quiet {
        let text = TextFormatter::new(!cli.no_color);
        for (outcome, failure) in outcomes.iter().zip(&merged.failures) {
            match failure {
                Some(Failure::Interrupted) => {
                    eprintln!("{}", text.format_interrupted(&outcome.query, outcome.record_count()));
                }
                Some(Failure::Error(message)) => {
                    eprintln!("{}", text.format_failure(&outcome.query, message));
                }
                None => {}
            }
            if args.report {
                eprintln!("{}", JsonFormatter::new(false).format_outcome(outcome)?);
            }
        }
    }

    output::write_table(&merged.table, cli).await?;

    let failed = merged.failed();
    if !cli.quiet {
        let summary = TextFormatter::new(!cli.no_color).format_summary(
            merged.table.len(),
            total,
            failed,
            requests,
            started.elapsed(),
        );
        eprintln!("{summary}");
    }

    let code = if shutdown.is_shutdown_requested() || merged.interrupted() {
        ExitCode::Interrupted
    } else if failed == 0 {
        ExitCode::Success
    } else if failed == total {
        ExitCode::Error
    } else {
        ExitCode::Partial
    };
    debug!(?code, rows = merged.table.len(), failed, "Fetch finished");
    Ok(code)
}

/// Why a target did not finish.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    Interrupted,
    Error(String),
}

/// Rows of every target plus one failure slot per target.
#[derive(Debug)]
struct Merged {
    table: Table,
    failures: Vec<Option<Failure>>,
}

impl Merged {
    fn failed(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f, Some(Failure::Error(_))))
            .count()
    }

    fn interrupted(&self) -> bool {
        self.failures.iter().any(|f| f == &Some(Failure::Interrupted))
    }
}

/// Merges outcomes in order. Pages fetched before an error or interruption
/// are kept; a target whose rows fail the schema contributes none.
fn merge_outcomes(outcomes: &[FetchOutcome], validate: bool) -> Merged {
    let mut table = Table::default();
    let mut failures = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        let rows = if validate {
            outcome.validated_table()
        } else {
            Ok(outcome.table())
        };

        let mut failure = match &outcome.error {
            None => None,
            Some(e) if e.is_cancelled() => Some(Failure::Interrupted),
            Some(e) => Some(Failure::Error(e.to_string())),
        };

        match rows {
            Ok(rows) => table.append(rows),
            Err(e) => {
                warn!(query = %outcome.query, error = %e, "Dropping rows that do not fit the schema");
                failure = Some(Failure::Error(e.to_string()));
            }
        }
        failures.push(failure);
    }

    Merged { table, failures }
}

// ============================================================================
// Tests
// ============================================================================
