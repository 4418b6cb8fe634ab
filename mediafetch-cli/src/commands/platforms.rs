//! Platforms command - list platforms and their extractor chains.

use anyhow::Result;
use mediafetch_providers::PlatformRegistry;
use tracing::info;

use super::load_config;
use crate::output::{JsonFormatter, PlatformOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the platforms command.
pub fn run(cli: &Cli) -> Result<bool> {
    info!("Listing platforms");

    let config = load_config(cli)?;
    let platforms: Vec<PlatformOutput> = PlatformRegistry::all()
        .iter()
        .map(|desc| PlatformOutput {
            platform: desc.platform,
            display_name: desc.display_name().to_string(),
            default_quality: desc.default_quality(),
            sample_url: desc.metadata.sample_url.to_string(),
            chain: desc.chain_order(&config.extractors),
        })
        .collect();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_platforms_header());
            println!("{}", "─".repeat(70));
            for platform in &platforms {
                println!("{}", formatter.format_platform_line(platform));
            }
            println!();
            println!("Total: {} platforms", platforms.len());
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&platforms)?);
        }
    }

    Ok(true)
}
