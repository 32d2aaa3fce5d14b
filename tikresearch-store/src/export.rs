//! Table export.
//!
//! Three machine-readable formats:
//!
//! | format | shape |
//! |--------|-------|
//! | CSV | header row of column names, null as empty cell, lists as JSON |
//! | JSON | one array of flat objects |
//! | JSON Lines | one flat object per line |

use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use tikresearch_core::Table;

use crate::error::StoreError;
use crate::persistence::write_atomic;

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array.
    Json,
    /// Newline-delimited JSON.
    JsonLines,
}

impl ExportFormat {
    /// Usual file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::JsonLines => "jsonl",
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            other => Err(StoreError::Config(format!("unknown export format '{other}'"))),
        }
    }
}

// ============================================================================
// Writers
// ============================================================================

/// Row as a JSON object holding every table column.
fn row_object(table: &Table, row: usize) -> Map<String, JsonValue> {
    table
        .columns()
        .iter()
        .map(|column| (column.clone(), table.cell(row, column).to_json()))
        .collect()
}

/// Writes `table` as CSV.
///
/// # Errors
///
/// Returns `StoreError::Csv` if writing fails.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), StoreError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(table.columns())?;
    for row in table.iter_rows() {
        csv.write_record(row.iter().map(ToString::to_string))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes `table` as one pretty-printed JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(table: &Table, mut writer: W) -> Result<(), StoreError> {
    let rows: Vec<JsonValue> = (0..table.len())
        .map(|i| JsonValue::Object(row_object(table, i)))
        .collect();
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writeln!(writer)?;
    Ok(())
}

/// Writes `table` as JSON Lines.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_jsonl<W: Write>(table: &Table, mut writer: W) -> Result<(), StoreError> {
    for i in 0..table.len() {
        serde_json::to_writer(&mut writer, &row_object(table, i))?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Writes `table` in `format`.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_table<W: Write>(table: &Table, format: ExportFormat, writer: W) -> Result<(), StoreError> {
    match format {
        ExportFormat::Csv => write_csv(table, writer),
        ExportFormat::Json => write_json(table, writer),
        ExportFormat::JsonLines => write_jsonl(table, writer),
    }
}

/// Writes `table` to a file in `format`, replacing it atomically.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub async fn export_to_file(table: &Table, format: ExportFormat, path: &Path) -> Result<(), StoreError> {
    let mut buffer = Vec::new();
    write_table(table, format, &mut buffer)?;
    write_atomic(path, &buffer, false).await?;
    debug!(path = %path.display(), rows = table.len(), %format, "Exported table");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
