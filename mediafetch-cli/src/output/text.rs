//! Text output formatting with colors.

use mediafetch_core::{AttemptRecord, Job, JobState, MediaRef};

use super::{ClassifyOutput, PlatformOutput};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Formats a job with its outcome and attempt history.
    pub fn format_job(&self, job: &Job) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{} ({}, {})",
            self.bold(job.platform.display_name()),
            job.quality,
            self.dim(job.id.as_str())
        ));
        lines.push(format!("URL:      {}", job.normalized_url));
        lines.push(format!("State:    {}", self.format_state(job.state)));

        match &job.result {
            Some(MediaRef::Remote { url }) => lines.push(format!("Media:    {}", self.cyan(url))),
            Some(MediaRef::Local { artifact_id }) => {
                lines.push(format!("Artifact: {}", self.cyan(artifact_id.as_str())));
            }
            None => {}
        }

        if let Some(failure) = &job.failure {
            lines.push(format!(
                "Error:    {} ({})",
                failure.message,
                self.red(failure.kind.as_str())
            ));
            if let Some(detail) = &failure.detail {
                lines.push(format!("          {}", self.dim(detail)));
            }
        }

        if !job.attempts.is_empty() {
            lines.push(String::new());
            lines.push("Attempts:".to_string());
            for (i, attempt) in job.attempts.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, self.format_attempt(attempt)));
            }
        }

        lines.join("\n")
    }

    fn format_state(&self, state: JobState) -> String {
        match state {
            JobState::Succeeded => self.green(state.as_str()),
            JobState::Failed => self.red(state.as_str()),
            JobState::Cancelled => self.yellow(state.as_str()),
            JobState::Queued | JobState::Running => state.as_str().to_string(),
        }
    }

    /// Formats one attempt: extractor, proxy, outcome and elapsed time.
    pub fn format_attempt(&self, attempt: &AttemptRecord) -> String {
        let elapsed = (attempt.ended_at - attempt.started_at).num_milliseconds();
        let outcome = if attempt.succeeded() {
            self.green("ok")
        } else if attempt.cancelled {
            self.yellow("cancelled")
        } else {
            let kind = attempt.failure_kind.map_or("failed", |k| k.as_str());
            self.red(kind)
        };

        let mut line = format!("{:<24} {}", attempt.extractor, outcome);
        if let Some(proxy) = &attempt.proxy {
            line.push_str(&format!(" via {proxy}"));
        }
        line.push_str(&self.dim(&format!(" ({}.{:03}s)", elapsed / 1000, elapsed % 1000)));
        line
    }

    // ========================================================================
    // Classification & Platforms
    // ========================================================================

    /// Formats a classification result.
    pub fn format_classified(&self, output: &ClassifyOutput) -> String {
        let mut lines = vec![
            format!("Platform:   {}", self.bold(output.platform.display_name())),
            format!("Normalized: {}", self.cyan(&output.normalized_url)),
        ];
        if !output.chain.is_empty() {
            lines.push(format!("Chain:      {}", output.chain.join(" → ")));
        }
        lines.join("\n")
    }

    /// Formats the header for the platforms list.
    pub fn format_platforms_header(&self) -> String {
        self.bold(&format!("{:<12} {:<10} {}", "Platform", "Quality", "Extractor chain"))
    }

    /// Formats one row of the platforms list.
    pub fn format_platform_line(&self, platform: &PlatformOutput) -> String {
        let chain = if platform.chain.is_empty() {
            self.red("(none)")
        } else {
            platform.chain.join(" → ")
        };
        format!(
            "{:<12} {:<10} {}",
            platform.display_name,
            platform.default_quality.to_string(),
            chain
        )
    }

    // ========================================================================
    // Color Helpers
    // ========================================================================

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}
