// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TikResearch` Store
//!
//! Everything the client keeps on disk.
//!
//! This crate provides:
//!
//! - **Settings**: TOML configuration with environment overrides
//! - **Keychain**: Client secret storage in the OS keychain
//! - **Export**: CSV, JSON and JSON Lines writers for result tables
//! - **Persistence**: Atomic, owner-only file writes
//!
//! ## Usage
//!
//! ```ignore
//! use tikresearch_store::{export_to_file, ExportFormat, Settings};
//! use tikresearch_fetch::ResearchClient;
//!
//! let settings = Settings::load().await?.with_env_overrides();
//! let client = ResearchClient::new(
//!     settings.to_fetch_settings(),
//!     settings.client_key()?,
//!     settings.client_secret()?,
//! )?;
//!
//! let table = client.collect(query).await.table();
//! export_to_file(&table, ExportFormat::Csv, "videos.csv".as_ref()).await?;
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod keychain;
pub mod persistence;

pub use config::{
    ApiSettings, CredentialSettings, PagingSettings, RetrySettings, Settings, ENV_BASE_URL,
    ENV_CLIENT_KEY, ENV_CLIENT_SECRET,
};
pub use error::StoreError;
pub use export::{
    export_to_file, write_csv, write_json, write_jsonl, write_table, ExportFormat,
};
pub use persistence::{default_config_dir, default_settings_path, read_optional, write_atomic};
