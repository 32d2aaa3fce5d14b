//! Text output: aligned tables and status lines, with optional colors.

use std::time::Duration;

use tikresearch_core::{Table, Value};
use tikresearch_fetch::Credential;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

const ELLIPSIS: char = '…';
const COLUMN_GAP: &str = "  ";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    max_cell_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            max_cell_width: 40,
        }
    }

    /// Sets the widest a cell may be before it is cut.
    pub fn with_max_cell_width(mut self, width: usize) -> Self {
        self.max_cell_width = width.max(1);
        self
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Formats a table with one aligned column per table column.
    pub fn format_table(&self, table: &Table) -> String {
        if table.is_empty() {
            return self.dim("No results");
        }

        let cells: Vec<Vec<String>> = table
            .iter_rows()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();

        let widths: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                cells
                    .iter()
                    .map(|row| width(&row[i]))
                    .chain(std::iter::once(width(column)))
                    .max()
                    .unwrap_or(0)
                    .min(self.max_cell_width)
            })
            .collect();

        let mut lines = Vec::with_capacity(cells.len() + 2);

        let header: Vec<String> = table
            .columns()
            .iter()
            .zip(&widths)
            .map(|(column, w)| self.bold(&pad(&self.truncate(column), *w)))
            .collect();
        lines.push(header.join(COLUMN_GAP).trim_end().to_string());

        let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        lines.push(self.dim(&rule.join(COLUMN_GAP)));

        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| pad(&self.truncate(cell), *w))
                .collect();
            lines.push(line.join(COLUMN_GAP).trim_end().to_string());
        }

        lines.join("\n")
    }

    fn truncate(&self, text: &str) -> String {
        if width(text) <= self.max_cell_width {
            return text.to_string();
        }
        let mut cut: String = text.chars().take(self.max_cell_width - 1).collect();
        cut.push(ELLIPSIS);
        cut
    }

    // ========================================================================
    // Status Lines
    // ========================================================================

    /// Formats a failed query.
    pub fn format_failure(&self, query: &str, error: &str) -> String {
        format!("{} {}: {}", self.red("✗"), self.bold(query), error)
    }

    /// Formats an interrupted query.
    pub fn format_interrupted(&self, query: &str, rows: usize) -> String {
        format!(
            "{} {}: interrupted after {} row{}",
            self.yellow("!"),
            self.bold(query),
            rows,
            plural(rows)
        )
    }

    /// Formats the closing summary of a run.
    pub fn format_summary(
        &self,
        rows: usize,
        queries: usize,
        failed: usize,
        requests: u32,
        elapsed: Duration,
    ) -> String {
        let status = if failed == 0 {
            self.green("✓")
        } else {
            self.yellow("!")
        };
        let mut line = format!(
            "{status} {rows} row{} from {queries} quer{} in {requests} request{} ({:.1}s)",
            plural(rows),
            if queries == 1 { "y" } else { "ies" },
            if requests == 1 { "" } else { "s" },
            elapsed.as_secs_f64()
        );
        if failed > 0 {
            line.push_str(&format!(", {} failed", self.red(&failed.to_string())));
        }
        line
    }

    /// Formats a working credential.
    pub fn format_credential(&self, credential: &Credential) -> String {
        format!("{} Credentials OK: {}", self.green("✓"), credential)
    }

    // ========================================================================
    // Color Helpers
    // ========================================================================

    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_colors {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }

    fn bold(&self, s: &str) -> String {
        self.paint(BOLD, s)
    }

    fn dim(&self, s: &str) -> String {
        self.paint(DIM, s)
    }

    fn green(&self, s: &str) -> String {
        self.paint(GREEN, s)
    }

    fn yellow(&self, s: &str) -> String {
        self.paint(YELLOW, s)
    }

    fn red(&self, s: &str) -> String {
        self.paint(RED, s)
    }
}

fn cell_text(value: &Value) -> String {
    // Newlines would break the row layout.
    value.to_string().replace(['\n', '\r'], " ")
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, width_to: usize) -> String {
    let mut out = s.to_string();
    let missing = width_to.saturating_sub(width(s));
    out.extend(std::iter::repeat_n(' ', missing));
    out
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
