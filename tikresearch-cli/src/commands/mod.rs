//! CLI command implementations.

pub mod config;
pub mod fetch;
pub mod token;

use anyhow::{Context, Result};
use tikresearch_fetch::{FetchError, ResearchClient};
use tikresearch_store::{Settings, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Cli, ExitCode};

/// Loads settings from `--config` or the default path, applies environment
/// and command-line overrides, and checks them.
pub async fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = cli.config.clone().unwrap_or_else(Settings::default_path);
    debug!(path = %path.display(), "Loading settings");

    let mut settings = Settings::load_from(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))?
        .with_env_overrides();

    if let Some(concurrency) = cli.concurrency {
        settings.paging.concurrency = concurrency;
    }

    settings.validate()?;
    Ok(settings)
}

/// Builds a client from settings. Cancelling `cancel` stops every query the
/// client runs.
pub fn build_client(settings: &Settings, cancel: CancellationToken) -> Result<ResearchClient> {
    let client_key = settings.client_key()?;
    let client_secret = settings.client_secret()?;
    let client = ResearchClient::new(settings.to_fetch_settings(), client_key, client_secret)?
        .with_cancellation(cancel);
    Ok(client)
}

/// Maps an error to the process exit code.
pub fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    if let Some(store) = error.downcast_ref::<StoreError>() {
        return match store {
            StoreError::Config(_)
            | StoreError::MissingCredential(_)
            | StoreError::TomlParse(_) => ExitCode::Config,
            _ => ExitCode::Error,
        };
    }

    if let Some(fetch) = error.downcast_ref::<FetchError>() {
        return match fetch {
            FetchError::Auth { .. } => ExitCode::Config,
            FetchError::Cancelled { .. } => ExitCode::Interrupted,
            _ => ExitCode::Error,
        };
    }

    ExitCode::Error
}

#[cfg(test)]
mod tests {
    use super::*;
    use tikresearch_fetch::RequestContext;

    #[test]
    fn test_exit_codes() {
        let missing = anyhow::Error::new(StoreError::MissingCredential("client key".into()));
        assert_eq!(exit_code_for(&missing), ExitCode::Config);

        let auth = anyhow::Error::new(FetchError::Auth {
            context: RequestContext::new("oauth/token/", serde_json::json!({}), 1),
            message: "invalid client".into(),
        });
        assert_eq!(exit_code_for(&auth), ExitCode::Config);

        let cancelled = anyhow::Error::new(FetchError::Cancelled {
            context: RequestContext::new("video/query/", serde_json::json!({}), 1),
        });
        assert_eq!(exit_code_for(&cancelled), ExitCode::Interrupted);

        assert_eq!(exit_code_for(&anyhow::anyhow!("other")), ExitCode::Error);
    }

    #[test]
    fn test_exit_code_sees_through_context() {
        let error = anyhow::Error::new(StoreError::Config("paging.max_count".into()))
            .context("loading config.toml");
        assert_eq!(exit_code_for(&error), ExitCode::Config);
    }
}
