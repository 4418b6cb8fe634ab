//! Fetch command - resolve one URL without the HTTP layer.

use anyhow::Result;
use clap::Args;
use mediafetch_core::{JobState, MediaRef};
use mediafetch_store::SubmitOptions;
use tracing::info;

use super::{build_runtime, load_config};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// Video page URL.
    pub url: String,

    /// Quality: best, audio, or a height such as 720p.
    #[arg(long)]
    pub quality: Option<String>,
}

/// Submits the URL, waits for a terminal state and prints the job.
///
/// Ctrl+C cancels the job and still prints its final snapshot.
pub async fn run(args: &FetchArgs, cli: &Cli) -> Result<bool> {
    let config = load_config(cli)?;
    let runtime = build_runtime(&config).await?;
    let coordinator = runtime.coordinator;

    let mut options = SubmitOptions::default();
    if let Some(quality) = &args.quality {
        options = options.with_quality(quality);
    }
    let id = coordinator.submit(&args.url, options)?;
    info!(job_id = %id, "Submitted");

    let job = tokio::select! {
        job = coordinator.wait_for(&id) => job?,
        _ = tokio::signal::ctrl_c() => {
            coordinator.cancel(&id)?;
            coordinator.wait_for(&id).await?
        }
    };
    coordinator.shutdown();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_job(&job));
            let artifact = job
                .result
                .as_ref()
                .and_then(MediaRef::artifact_id)
                .and_then(|id| coordinator.artifacts().get(id));
            if let Some(artifact) = artifact {
                println!("File:     {}", artifact.file_path.display());
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&job)?);
        }
    }

    Ok(job.state == JobState::Succeeded)
}
