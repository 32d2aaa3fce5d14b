//! Output formatting for CLI.

mod json;
mod text;

pub use json::{JsonFormatter, OutcomeOutput};
pub use text::TextFormatter;

use anyhow::{Context, Result};
use std::io::{IsTerminal, Write};
use std::path::Path;
use tikresearch_core::Table;
use tikresearch_store::{export_to_file, write_atomic, ExportFormat};
use tracing::info;

use crate::{Cli, OutputFormat};

/// Picks the output format: `--format`, else the `--output` extension,
/// else text.
pub fn resolve_format(requested: Option<OutputFormat>, output: Option<&Path>) -> OutputFormat {
    if let Some(format) = requested {
        return format;
    }
    match output.and_then(ExportFormat::from_path) {
        Some(ExportFormat::Csv) => OutputFormat::Csv,
        Some(ExportFormat::Json) => OutputFormat::Json,
        Some(ExportFormat::JsonLines) => OutputFormat::Jsonl,
        None => OutputFormat::Text,
    }
}

/// Export format behind a machine-readable output format.
pub fn export_format(format: OutputFormat) -> Option<ExportFormat> {
    match format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(ExportFormat::Json),
        OutputFormat::Jsonl => Some(ExportFormat::JsonLines),
        OutputFormat::Csv => Some(ExportFormat::Csv),
    }
}

/// True if text output should carry ANSI colors.
pub fn use_colors(cli: &Cli) -> bool {
    !cli.no_color && cli.output.is_none() && std::io::stdout().is_terminal()
}

/// Writes a result table to `--output` or stdout.
pub async fn write_table(table: &Table, cli: &Cli) -> Result<()> {
    let format = resolve_format(cli.format, cli.output.as_deref());

    match (export_format(format), &cli.output) {
        (Some(export), Some(path)) => {
            export_to_file(table, export, path)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), rows = table.len(), "Results written");
        }
        (Some(export), None) => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            tikresearch_store::write_table(table, export, &mut lock)?;
            lock.flush()?;
        }
        (None, Some(path)) => {
            let mut text = TextFormatter::new(false).format_table(table);
            text.push('\n');
            write_atomic(path, text.as_bytes(), false)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), rows = table.len(), "Results written");
        }
        (None, None) => {
            println!("{}", TextFormatter::new(use_colors(cli)).format_table(table));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
