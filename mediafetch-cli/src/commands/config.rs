//! Config command - inspect or write the configuration file.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use mediafetch_store::{AppConfig, default_config_dir};
use tracing::info;

use super::load_config;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration (file plus environment).
    Show,

    /// Show configuration paths.
    Path,

    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<bool> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Init { force } => init_config(cli, *force).await,
    }
}

fn show_config(cli: &Cli) -> Result<bool> {
    let mut config = load_config(cli)?;
    if config.extractors.remote.api_key.is_some() {
        config.extractors.remote.api_key = Some("********".to_string());
    }

    match cli.format {
        OutputFormat::Text => {
            println!("MediaFetch Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Listen:          {}:{}", config.server.host, config.server.port);
            println!("Max concurrent:  {}", config.jobs.max_concurrent);
            match config.jobs.per_client_limit {
                Some(limit) => println!("Per client:      {limit}"),
                None => println!("Per client:      unlimited"),
            }
            println!(
                "Timeouts:        {}s per attempt, {}s per job",
                config.jobs.attempt_timeout_secs, config.jobs.job_timeout_secs
            );
            println!("Artifact dir:    {}", config.artifact_dir().display());
            println!("Artifact TTL:    {}s", config.artifacts.ttl_secs);
            println!("Proxies:         {}", config.proxies.addresses.len());
            println!("Strict URLs:     {}", config.classifier.strict);
            println!("Extractor bin:   {}", config.extractors.native.binary);
            println!(
                "Remote API:      {}",
                config.extractors.remote.endpoint.as_deref().unwrap_or("not configured")
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(true)
}

fn show_paths(cli: &Cli) -> Result<bool> {
    let config_dir = default_config_dir();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let artifact_dir = load_config(cli).map_or_else(
        |_| AppConfig::default().artifact_dir(),
        |config| config.artifact_dir(),
    );

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Config file:   {}", config_path.display());
            println!("Artifact dir:  {}", artifact_dir.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "configDir": config_dir.display().to_string(),
                "configFile": config_path.display().to_string(),
                "artifactDir": artifact_dir.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(true)
}

async fn init_config(cli: &Cli, force: bool) -> Result<bool> {
    let path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    AppConfig::default().save_to(&path).await?;
    info!(path = %path.display(), "Configuration written");
    println!("Wrote {}", path.display());

    Ok(true)
}
