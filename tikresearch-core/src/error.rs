//! Core error types for `TikResearch`.

use std::fmt;
use thiserror::Error;

/// A single constraint a query failed to satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Where in the query the problem sits (e.g. `query.and[0].field_values`).
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Joins violations for the error message.
fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Core error type for `TikResearch` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The query violates one or more constraints. Every violation is listed.
    #[error("Invalid query ({} violation(s)): {}", .violations.len(), join_violations(.violations))]
    InvalidQuery {
        /// All violated constraints, in the order they were checked.
        violations: Vec<Violation>,
    },

    /// A normalized record does not match its schema.
    #[error("Schema error in field '{field}': expected {expected}, found {found}")]
    Schema {
        /// The offending field.
        field: String,
        /// What the schema expects.
        expected: String,
        /// What the record holds.
        found: String,
    },

    /// Invalid data from an API response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns the violations of an invalid query, or an empty slice.
    pub fn violations(&self) -> &[Violation] {
        match self {
            CoreError::InvalidQuery { violations } => violations,
            _ => &[],
        }
    }
}
