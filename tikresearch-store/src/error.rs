//! Store error types.

use thiserror::Error;

/// Errors that can occur while loading settings or writing results.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Settings file could not be parsed.
    #[error("Invalid settings file: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Settings could not be written as TOML.
    #[error("Could not encode settings: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client key or secret missing from every source.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// System keychain error.
    #[error("Keychain error: {0}")]
    Keychain(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}
