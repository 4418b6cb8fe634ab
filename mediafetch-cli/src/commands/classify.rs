//! Classify command - show how a URL is routed.

use anyhow::Result;
use clap::Args;
use mediafetch_core::Classifier;
use mediafetch_providers::PlatformRegistry;

use super::load_config;
use crate::output::{ClassifyOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// URL to classify.
    pub url: String,

    /// Accept any path on a supported host.
    #[arg(long)]
    pub lenient: bool,
}

/// Runs the classify command.
pub fn run(args: &ClassifyArgs, cli: &Cli) -> Result<bool> {
    let config = load_config(cli)?;
    let classifier = Classifier::new().with_strict(config.classifier.strict && !args.lenient);
    let classified = classifier.classify(&args.url)?;

    let chain = PlatformRegistry::get(classified.platform)
        .map(|d| d.chain_order(&config.extractors))
        .unwrap_or_default();
    let output = ClassifyOutput {
        platform: classified.platform,
        normalized_url: classified.normalized,
        chain,
    };

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_classified(&output));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(true)
}
