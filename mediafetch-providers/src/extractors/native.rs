//! Native command-line extractor.
//!
//! Drives a `yt-dlp` compatible binary as a subprocess. The tool writes the
//! media into the extraction output directory under a random token and
//! prints the final path, which becomes [`ExtractedMedia::LocalFile`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use mediafetch_core::{ExtractorKind, Quality};
use mediafetch_fetch::{
    AttemptScope, ExtractContext, ExtractError, ExtractRequest, ExtractedMedia, Extractor,
    ProcessError,
};

use super::diagnostics;

/// Identifier of the native extractor.
pub const NATIVE_EXTRACTOR_ID: &str = "native.ytdlp";

/// Best mp4 video plus m4a audio, falling back to any single file.
const BEST_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio";

// ============================================================================
// Config
// ============================================================================

/// Native tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeToolConfig {
    /// Binary name or path.
    pub binary: String,
    /// `--socket-timeout` in seconds.
    pub socket_timeout_secs: u64,
    /// `--retries`.
    pub retries: u32,
    /// `--limit-rate` value (e.g. `2M`).
    pub limit_rate: Option<String>,
    /// `--sleep-requests` in seconds.
    pub sleep_requests_secs: Option<f64>,
    /// Whether attempts go through the proxy pool.
    pub use_proxy: bool,
    /// Extra arguments inserted before the URL.
    pub extra_args: Vec<String>,
}

impl Default for NativeToolConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            socket_timeout_secs: 30,
            retries: 3,
            limit_rate: None,
            sleep_requests_secs: None,
            use_proxy: true,
            extra_args: Vec::new(),
        }
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Extractor backed by a `yt-dlp` compatible subprocess.
#[derive(Debug, Clone, Default)]
pub struct NativeToolExtractor {
    config: NativeToolConfig,
}

impl NativeToolExtractor {
    /// Creates an extractor from settings.
    pub fn new(config: NativeToolConfig) -> Self {
        Self { config }
    }

    /// Returns the settings.
    pub fn config(&self) -> &NativeToolConfig {
        &self.config
    }

    /// Builds the argument list for one run.
    pub fn build_args(
        &self,
        request: &ExtractRequest,
        proxy: Option<&str>,
        output_template: &Path,
    ) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            format_selector(request.quality),
            "-o".to_string(),
            output_template.display().to_string(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-mtime".to_string(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
            "--retries".to_string(),
            self.config.retries.to_string(),
        ];

        if !matches!(request.quality, Quality::Audio) {
            args.extend(["--merge-output-format".to_string(), "mp4".to_string()]);
        }
        if let Some(rate) = &self.config.limit_rate {
            args.extend(["--limit-rate".to_string(), rate.clone()]);
        }
        if let Some(sleep) = self.config.sleep_requests_secs {
            args.extend(["--sleep-requests".to_string(), sleep.to_string()]);
        }
        if let Some(proxy) = proxy {
            args.extend(["--proxy".to_string(), proxy.to_string()]);
        }

        args.extend(self.config.extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }
}

/// Format selector for a quality hint.
pub fn format_selector(quality: Quality) -> String {
    match quality {
        Quality::Best => BEST_FORMAT.to_string(),
        Quality::Audio => AUDIO_FORMAT.to_string(),
        Quality::MaxHeight(h) => format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best[height<={h}]/best"
        ),
    }
}

#[async_trait]
impl Extractor for NativeToolExtractor {
    fn id(&self) -> &str {
        NATIVE_EXTRACTOR_ID
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::NativeTool
    }

    fn uses_proxy(&self) -> bool {
        self.config.use_proxy
    }

    async fn is_available(&self, ctx: &ExtractContext) -> bool {
        ctx.process.command_exists(&self.config.binary)
    }

    #[instrument(skip(self, scope, ctx), fields(extractor = NATIVE_EXTRACTOR_ID, url = %request.url))]
    async fn extract(
        &self,
        request: &ExtractRequest,
        scope: &AttemptScope,
        ctx: &ExtractContext,
    ) -> Result<ExtractedMedia, ExtractError> {
        let dir = ctx.output_dir().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ExtractError::Transient(format!("cannot create {}: {e}", dir.display()))
        })?;

        let token = Uuid::new_v4().simple().to_string();
        let template = dir.join(format!("{token}.%(ext)s"));
        let args = self.build_args(request, scope.proxy.as_deref(), &template);

        debug!(binary = %self.config.binary, token = %token, "Running native extractor");

        let output = match ctx
            .process
            .run_cancellable(&self.config.binary, &args, scope.timeout, &scope.cancel)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                remove_partials(&dir, &token).await;
                return Err(match e {
                    ProcessError::Cancelled => ExtractError::Cancelled,
                    ProcessError::Timeout(limit) => ExtractError::Timeout(format!(
                        "{} did not finish within {limit:?}",
                        self.config.binary
                    )),
                    other => other.into(),
                });
            }
        };

        if !output.success() {
            remove_partials(&dir, &token).await;
            let err = diagnostics::classify(&output.stderr);
            debug!(exit_code = output.exit_code, error = %err, "Native extractor failed");
            return Err(err);
        }

        if let Some(path) = locate_output(&output.stdout, &dir, &token).await {
            debug!(path = %path.display(), "Native extractor produced file");
            return Ok(ExtractedMedia::LocalFile(path));
        }

        remove_partials(&dir, &token).await;
        Err(ExtractError::Transient(
            "extractor exited successfully but produced no output file".to_string(),
        ))
    }
}

// ============================================================================
// Output Files
// ============================================================================

/// Finds the finished, non-empty output file for `token`.
///
/// Prefers the path the tool printed; falls back to scanning `dir`.
async fn locate_output(stdout: &str, dir: &Path, token: &str) -> Option<PathBuf> {
    for line in stdout.lines().rev().map(str::trim).filter(|l| !l.is_empty()) {
        let path = PathBuf::from(line);
        if is_non_empty_file(&path).await {
            return Some(path);
        }
    }

    let mut best: Option<(u64, PathBuf)> = None;
    for path in token_files(dir, token).await {
        if is_partial(&path) {
            continue;
        }
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            continue;
        };
        if meta.is_file() && meta.len() > 0 && best.as_ref().is_none_or(|(len, _)| meta.len() > *len) {
            best = Some((meta.len(), path));
        }
    }
    best.map(|(_, path)| path)
}

/// Deletes every file the run for `token` left behind.
async fn remove_partials(dir: &Path, token: &str) {
    for path in token_files(dir, token).await {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
    }
}

async fn token_files(dir: &Path, token: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return files;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(token) {
            files.push(entry.path());
        }
    }
    files
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "part" || ext == "ytdl" || ext == "temp")
}

async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mediafetch_core::Platform;
    use mediafetch_fetch::CancellationToken;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(quality: Quality) -> ExtractRequest {
        ExtractRequest::new("https://youtube.com/watch?v=abc", Platform::YouTube, quality)
    }

    #[test]
    fn test_best_format_selector() {
        assert_eq!(format_selector(Quality::Best), BEST_FORMAT);
        assert_eq!(format_selector(Quality::Audio), AUDIO_FORMAT);
        assert!(format_selector(Quality::MaxHeight(720)).contains("height<=720"));
    }

    #[test]
    fn test_build_args() {
        let extractor = NativeToolExtractor::new(NativeToolConfig {
            limit_rate: Some("2M".to_string()),
            sleep_requests_secs: Some(1.5),
            ..NativeToolConfig::default()
        });
        let args = extractor.build_args(
            &request(Quality::Best),
            Some("http://10.0.0.1:8080"),
            Path::new("/out/tok.%(ext)s"),
        );

        let joined = args.join(" ");
        assert!(joined.starts_with(&format!("-f {BEST_FORMAT} -o /out/tok.%(ext)s")));
        assert!(joined.contains("--no-playlist"));
        assert!(joined.contains("--no-mtime"));
        assert!(joined.contains("--print after_move:filepath"));
        assert!(joined.contains("--socket-timeout 30"));
        assert!(joined.contains("--retries 3"));
        assert!(joined.contains("--limit-rate 2M"));
        assert!(joined.contains("--sleep-requests 1.5"));
        assert!(joined.contains("--proxy http://10.0.0.1:8080"));
        assert!(joined.contains("--merge-output-format mp4"));
        assert_eq!(args.last().unwrap(), "https://youtube.com/watch?v=abc");
        assert_eq!(args[args.len() - 2], "--");
    }

    #[test]
    fn test_build_args_direct_audio() {
        let extractor = NativeToolExtractor::default();
        let args = extractor.build_args(&request(Quality::Audio), None, Path::new("/o/%(ext)s"));
        assert!(!args.contains(&"--proxy".to_string()));
        assert!(!args.contains(&"--merge-output-format".to_string()));
        assert!(!args.contains(&"--limit-rate".to_string()));
        assert!(args.contains(&"--no-mtime".to_string()));
    }

    #[tokio::test]
    async fn test_locate_output_prefers_printed_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tok.mp4");
        std::fs::write(&file, b"data").unwrap();

        let stdout = format!("[info] something\n{}\n", file.display());
        assert_eq!(locate_output(&stdout, dir.path(), "tok").await, Some(file));
    }

    #[tokio::test]
    async fn test_locate_output_scans_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tok.mp4.part"), b"partial-data").unwrap();
        std::fs::write(dir.path().join("tok.mp4"), b"done").unwrap();
        std::fs::write(dir.path().join("other.mp4"), b"unrelated-bigger").unwrap();

        let found = locate_output("", dir.path(), "tok").await;
        assert_eq!(found, Some(dir.path().join("tok.mp4")));
    }

    #[tokio::test]
    async fn test_locate_output_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tok.mp4");
        std::fs::write(&file, b"").unwrap();

        let stdout = file.display().to_string();
        assert_eq!(locate_output(&stdout, dir.path(), "tok").await, None);
    }

    #[tokio::test]
    async fn test_remove_partials() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tok.f137.mp4.part"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.mp4"), b"x").unwrap();

        remove_partials(dir.path(), "tok").await;
        assert!(!dir.path().join("tok.f137.mp4.part").exists());
        assert!(dir.path().join("keep.mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let extractor = NativeToolExtractor::new(NativeToolConfig {
            binary: "mediafetch-no-such-binary".to_string(),
            ..NativeToolConfig::default()
        });
        let ctx = ExtractContext::new();
        assert!(!extractor.is_available(&ctx).await);

        let scope = AttemptScope::new(CancellationToken::new(), Duration::from_secs(5));
        let dir = TempDir::new().unwrap();
        let ctx = ExtractContext::builder().output_dir(dir.path()).build();
        let err = extractor
            .extract(&request(Quality::Best), &scope, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(mediafetch_core::FailureKind::Transient));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_success_and_failure() {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();

        // Writes a file next to the -o template and prints its path.
        let ok_script = bin_dir.path().join("fake-ok");
        std::fs::write(
            &ok_script,
            "#!/bin/sh\nwhile [ \"$1\" != \"-o\" ]; do shift; done\n\
             out=$(echo \"$2\" | sed 's/%(ext)s/mp4/')\necho media > \"$out\"\necho \"$out\"\n",
        )
        .unwrap();
        let fail_script = bin_dir.path().join("fake-fail");
        std::fs::write(
            &fail_script,
            "#!/bin/sh\necho 'ERROR: [youtube] abc: Video unavailable' >&2\nexit 1\n",
        )
        .unwrap();
        for script in [&ok_script, &fail_script] {
            std::fs::set_permissions(script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let ctx = ExtractContext::builder().output_dir(out_dir.path()).build();
        let scope = AttemptScope::new(CancellationToken::new(), Duration::from_secs(10));

        let ok = NativeToolExtractor::new(NativeToolConfig {
            binary: ok_script.display().to_string(),
            ..NativeToolConfig::default()
        });
        let media = ok.extract(&request(Quality::Best), &scope, &ctx).await.unwrap();
        let ExtractedMedia::LocalFile(path) = media else {
            panic!("expected a local file");
        };
        assert!(path.starts_with(out_dir.path()));
        assert_eq!(path.extension().unwrap(), "mp4");

        let fail = NativeToolExtractor::new(NativeToolConfig {
            binary: fail_script.display().to_string(),
            ..NativeToolConfig::default()
        });
        let err = fail.extract(&request(Quality::Best), &scope, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), Some(mediafetch_core::FailureKind::NotFound));
    }
}
