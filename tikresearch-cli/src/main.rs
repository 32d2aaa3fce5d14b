// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `TikResearch` CLI - TikTok Research API queries from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Videos with a hashtag in Germany, January 2024
//! tikresearch videos --hashtag fußball --region DE --start 20240101 --end 20240131
//!
//! # Same, saved as CSV
//! tikresearch videos --hashtag fußball --start 20240101 --end 20240131 -o videos.csv
//!
//! # Profiles of several users as JSON Lines
//! tikresearch users alice bob --format jsonl
//!
//! # Followers, capped at 500 rows
//! tikresearch followers alice --limit 500
//!
//! # Check credentials
//! tikresearch token
//! ```

mod commands;
mod output;
mod shutdown;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{config, fetch, token};
use shutdown::ShutdownCoordinator;

// ============================================================================
// CLI Definition
// ============================================================================

/// `TikResearch` CLI - TikTok Research API client.
#[derive(Parser)]
#[command(name = "tikresearch")]
#[command(about = "TikTok Research API client")]
#[command(long_about = r#"
TikResearch queries the TikTok Research API and writes flat tables.

Credentials are read from the config file, the TIKTOK_CLIENT_KEY and
TIKTOK_CLIENT_SECRET environment variables, or the system keychain.

Examples:
  tikresearch videos --hashtag cats --start 20240101 --end 20240131
  tikresearch users alice bob --format json
  tikresearch followers alice -o followers.csv
  tikresearch comments 7300000000000000000
  tikresearch config init --client-key awxyz
"#)]
#[command(version)]
#[command(author = "TikResearch Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (default: from --output extension, else text).
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Write results to a file instead of stdout.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Queries run at once (overrides the config file).
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Search videos.
    #[command(visible_alias = "v")]
    Videos(fetch::VideosArgs),

    /// Profile information for users.
    Users(fetch::UsersArgs),

    /// Videos liked by users.
    Liked(fetch::UsersArgs),

    /// Videos reposted by users.
    Reposted(fetch::UsersArgs),

    /// Videos pinned by users.
    Pinned(fetch::UsersArgs),

    /// Followers of users.
    Followers(fetch::UsersArgs),

    /// Accounts users follow.
    Following(fetch::UsersArgs),

    /// Comments on videos.
    Comments(fetch::CommentsArgs),

    /// Check that the credentials work.
    Token,

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Text,
    /// JSON array.
    Json,
    /// One JSON object per line.
    Jsonl,
    /// Comma-separated values.
    Csv,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Some targets failed, others were written.
    Partial = 2,
    /// Missing or invalid configuration or credentials.
    Config = 3,
    /// Interrupted by Ctrl-C.
    Interrupted = 130,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("tikresearch=debug,tikresearch_core=debug,tikresearch_fetch=debug,tikresearch_store=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let shutdown = ShutdownCoordinator::new();
    shutdown.register_handlers();

    let result = match &cli.command {
        Commands::Videos(args) => fetch::run_videos(args, &cli, &shutdown).await,
        Commands::Users(args) => fetch::run_users(fetch::UserList::Info, args, &cli, &shutdown).await,
        Commands::Liked(args) => fetch::run_users(fetch::UserList::Liked, args, &cli, &shutdown).await,
        Commands::Reposted(args) => {
            fetch::run_users(fetch::UserList::Reposted, args, &cli, &shutdown).await
        }
        Commands::Pinned(args) => fetch::run_users(fetch::UserList::Pinned, args, &cli, &shutdown).await,
        Commands::Followers(args) => {
            fetch::run_users(fetch::UserList::Followers, args, &cli, &shutdown).await
        }
        Commands::Following(args) => {
            fetch::run_users(fetch::UserList::Following, args, &cli, &shutdown).await
        }
        Commands::Comments(args) => fetch::run_comments(args, &cli, &shutdown).await,
        Commands::Token => token::run(&cli).await,
        Commands::Config(args) => config::run(args, &cli).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            commands::exit_code_for(&e)
        }
    };

    if code != ExitCode::Success {
        std::process::exit(code as i32);
    }

    Ok(())
}
