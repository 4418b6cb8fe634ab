// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `MediaFetch` CLI - run the fetch service or resolve URLs from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Run the HTTP service
//! mediafetch serve --port 8080
//!
//! # Resolve one URL and print the job
//! mediafetch fetch https://youtu.be/dQw4w9WgXcQ --quality 720p
//!
//! # Check how a URL is routed
//! mediafetch classify https://www.tiktok.com/@user/video/123
//!
//! # Show extractor chains
//! mediafetch platforms --format json --pretty
//!
//! # Write a default config file
//! mediafetch config init
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{classify, config, fetch, platforms, serve};

// ============================================================================
// CLI Definition
// ============================================================================

/// `MediaFetch` CLI - resilient media URL resolution.
#[derive(Parser)]
#[command(name = "mediafetch")]
#[command(about = "Resolve social video URLs into playable media")]
#[command(long_about = r"
MediaFetch turns social video page URLs into direct media URLs or
downloadable files, trying a chain of extractors per platform.

Supported platforms:
  • YouTube (youtube)
  • TikTok (tiktok)
  • Instagram (instagram)
  • Facebook (facebook)

Examples:
  mediafetch serve                         # HTTP service on the configured port
  mediafetch fetch <url>                   # One-shot resolve
  mediafetch classify <url>                # Platform and normalized URL
  mediafetch platforms                     # Extractor chain per platform
")]
#[command(version)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file (defaults to the platform config dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colors.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging and error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service.
    Serve(serve::ServeArgs),

    /// Resolve one URL and wait for the result.
    Fetch(fetch::FetchArgs),

    /// Show which platform a URL belongs to.
    Classify(classify::ClassifyArgs),

    /// List platforms and their extractor chains.
    Platforms,

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// General error.
    Error = 1,
    /// The fetched job did not succeed.
    JobFailed = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, serving: bool) {
    if quiet {
        return;
    }

    let default = if verbose {
        "mediafetch=debug,info"
    } else if serving {
        "mediafetch=info,warn"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, matches!(cli.command, Commands::Serve(_)));

    let result = match &cli.command {
        Commands::Serve(args) => serve::run(args, &cli).await,
        Commands::Fetch(args) => fetch::run(args, &cli).await,
        Commands::Classify(args) => classify::run(args, &cli),
        Commands::Platforms => platforms::run(&cli),
        Commands::Config(args) => config::run(args, &cli).await,
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(ExitCode::JobFailed as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
