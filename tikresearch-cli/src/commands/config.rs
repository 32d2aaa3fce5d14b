//! Config command - manage configuration.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use std::io::BufRead;
use tikresearch_store::{default_config_dir, keychain, Settings};
use tracing::info;

use crate::commands::load_settings;
use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration (secret masked).
    Show,

    /// Show configuration paths.
    Path,

    /// Write a config file with default settings.
    Init {
        /// Client key to store in the file.
        #[arg(long)]
        client_key: Option<String>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Store the client secret in the system keychain.
    SetSecret {
        /// The secret (read from stdin if omitted).
        secret: Option<String>,
    },

    /// Remove the client secret from the system keychain.
    DeleteSecret,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await?,
        ConfigAction::Path => show_paths(cli)?,
        ConfigAction::Init { client_key, force } => {
            init_config(client_key.as_deref(), *force, cli).await?;
        }
        ConfigAction::SetSecret { secret } => set_secret(secret.as_deref(), cli).await?,
        ConfigAction::DeleteSecret => delete_secret(cli).await?,
    }
    Ok(ExitCode::Success)
}

fn settings_path(cli: &Cli) -> std::path::PathBuf {
    cli.config.clone().unwrap_or_else(Settings::default_path)
}

async fn show_config(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli).await?.redacted();

    match cli.format {
        Some(OutputFormat::Json | OutputFormat::Jsonl) => {
            let pretty = cli.format == Some(OutputFormat::Json);
            println!("{}", JsonFormatter::new(pretty).format(&settings)?);
        }
        _ => {
            println!("# {}", settings_path(cli).display());
            print!("{}", settings.to_toml()?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_file = settings_path(cli);

    match cli.format {
        Some(OutputFormat::Json | OutputFormat::Jsonl) => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_file.display().to_string(),
            });
            let pretty = cli.format == Some(OutputFormat::Json);
            println!("{}", JsonFormatter::new(pretty).format(&paths)?);
        }
        _ => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_file.display());
        }
    }

    Ok(())
}

async fn init_config(client_key: Option<&str>, force: bool, cli: &Cli) -> Result<()> {
    let path = settings_path(cli);
    if !force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let mut settings = Settings::default();
    settings.credentials.client_key = client_key.map(str::to_string);
    settings.save_to(&path).await?;

    info!(path = %path.display(), "Config written");
    if !cli.quiet {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

async fn set_secret(secret: Option<&str>, cli: &Cli) -> Result<()> {
    let settings = load_settings(cli).await?;
    let client_key = settings.client_key()?;

    let secret = match secret {
        Some(s) => s.to_string(),
        None => read_secret_line()?,
    };
    if secret.is_empty() {
        bail!("empty client secret");
    }

    keychain::store_client_secret(client_key, &secret)?;
    if !cli.quiet {
        println!("Stored client secret for {client_key} in the keychain");
    }
    Ok(())
}

async fn delete_secret(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli).await?;
    let client_key = settings.client_key()?;

    keychain::delete_client_secret(client_key)?;
    if !cli.quiet {
        println!("Removed client secret for {client_key} from the keychain");
    }
    Ok(())
}

fn read_secret_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading client secret from stdin")?;
    Ok(line.trim().to_string())
}
