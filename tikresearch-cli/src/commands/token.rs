//! Token command - check that the credentials work.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commands::{build_client, load_settings};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the token command.
pub async fn run(cli: &Cli) -> Result<ExitCode> {
    let settings = load_settings(cli).await?;
    let client = build_client(&settings, CancellationToken::new())?;

    let credential = client.check_credentials().await?;
    info!(expires_at = %credential.expires_at, "Token obtained");

    match cli.format {
        Some(OutputFormat::Json | OutputFormat::Jsonl) => {
            let pretty = cli.format == Some(OutputFormat::Json);
            println!("{}", JsonFormatter::new(pretty).format_credential(&credential)?);
        }
        _ => {
            if !cli.quiet {
                println!("{}", TextFormatter::new(!cli.no_color).format_credential(&credential));
            }
        }
    }

    Ok(ExitCode::Success)
}
