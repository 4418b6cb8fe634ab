//! Classification of native-tool diagnostics.
//!
//! The native extractor reports failures as free text on stderr, often
//! wrapped in ANSI colour codes. This module strips the escapes and maps
//! well-known phrases onto [`ExtractError`] variants.

use std::sync::LazyLock;

use regex::Regex;

use mediafetch_fetch::ExtractError;

/// Longest diagnostic kept in an error.
const MAX_DETAIL_LEN: usize = 500;

// ============================================================================
// Patterns
// ============================================================================

// Checked in order; the first match wins.
static RATE_LIMITED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|too many requests|rate[ -]?limit").expect("Invalid regex")
});

static BLOCKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbot\b|captcha|\b403\b|forbidden|login required|checkpoint required")
        .expect("Invalid regex")
});

static NOT_FOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)video unavailable|private video|\b404\b|removed|does not exist|not available in your country")
        .expect("Invalid regex")
});

static FATAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)unsupported url|\bdrm\b").expect("Invalid regex"));

static TIMEOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)timed out|timeout").expect("Invalid regex"));

static RETRY_AFTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry[- ]after:?\s*(\d+)").expect("Invalid regex"));

// ============================================================================
// Classification
// ============================================================================

/// Maps a failed run's stderr onto an extraction error.
///
/// Anything unrecognised is [`ExtractError::Transient`] so the chain moves
/// on to the next extractor.
pub fn classify(stderr: &str) -> ExtractError {
    let clean = strip_ansi_escapes::strip_str(stderr);
    let detail = summarize(&clean);

    if RATE_LIMITED_RE.is_match(&clean) {
        let retry_after = RETRY_AFTER_RE
            .captures(&clean)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        return ExtractError::RateLimited {
            retry_after,
            detail,
        };
    }
    if BLOCKED_RE.is_match(&clean) {
        return ExtractError::Blocked(detail);
    }
    if NOT_FOUND_RE.is_match(&clean) {
        return ExtractError::NotFound(detail);
    }
    if FATAL_RE.is_match(&clean) {
        return ExtractError::Fatal(detail);
    }
    if TIMEOUT_RE.is_match(&clean) {
        return ExtractError::Timeout(detail);
    }
    ExtractError::Transient(detail)
}

/// Picks the most useful line of a diagnostic: the last `ERROR:` line,
/// else the last non-empty line.
pub fn summarize(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let line = lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .copied()
        .unwrap_or("no diagnostic output");

    truncate(line, MAX_DETAIL_LEN)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mediafetch_core::FailureKind;

    fn kind_of(stderr: &str) -> FailureKind {
        classify(stderr).kind().unwrap()
    }

    #[test]
    fn test_rate_limited() {
        assert_eq!(
            kind_of("ERROR: [youtube] abc: HTTP Error 429: Too Many Requests"),
            FailureKind::RateLimited
        );
        assert_eq!(kind_of("rate-limit reached for this IP"), FailureKind::RateLimited);
    }

    #[test]
    fn test_retry_after_is_parsed() {
        let err = classify("HTTP Error 429: Too Many Requests (Retry-After: 30)");
        match err {
            ExtractError::RateLimited { retry_after, .. } => assert_eq!(retry_after, Some(30)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blocked() {
        assert_eq!(
            kind_of("ERROR: [youtube] abc: Sign in to confirm you're not a bot"),
            FailureKind::Blocked
        );
        assert_eq!(kind_of("HTTP Error 403: Forbidden"), FailureKind::Blocked);
        assert_eq!(kind_of("Please solve the captcha"), FailureKind::Blocked);
    }

    #[test]
    fn test_bot_matches_whole_word_only() {
        assert_eq!(kind_of("robotic failure"), FailureKind::Transient);
    }

    #[test]
    fn test_not_found() {
        assert_eq!(kind_of("ERROR: [youtube] abc: Video unavailable"), FailureKind::NotFound);
        assert_eq!(kind_of("ERROR: Private video"), FailureKind::NotFound);
        assert_eq!(kind_of("This video has been removed"), FailureKind::NotFound);
    }

    #[test]
    fn test_fatal() {
        assert_eq!(kind_of("ERROR: Unsupported URL: https://x.test"), FailureKind::Fatal);
        assert_eq!(kind_of("ERROR: This video is DRM protected"), FailureKind::Fatal);
    }

    #[test]
    fn test_timeout_and_fallback() {
        assert_eq!(kind_of("ERROR: Read timed out."), FailureKind::Timeout);
        assert_eq!(kind_of("ERROR: something odd happened"), FailureKind::Transient);
        assert_eq!(kind_of(""), FailureKind::Transient);
    }

    #[test]
    fn test_ansi_is_stripped() {
        let err = classify("\x1b[0;31mERROR:\x1b[0m Video unavailable");
        assert_eq!(err.kind(), Some(FailureKind::NotFound));
        assert!(!err.to_string().contains('\x1b'));
    }

    #[test]
    fn test_summarize_prefers_error_line() {
        let text = "[info] downloading\nERROR: boom\n[debug] trailing";
        assert_eq!(summarize(text), "ERROR: boom");
        assert_eq!(summarize("one\ntwo\n"), "two");
        assert_eq!(summarize("   "), "no diagnostic output");
    }

    #[test]
    fn test_truncate() {
        let long = "é".repeat(400);
        let out = truncate(&long, 11);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 14);
    }
}
