//! Platform classification and URL normalization.
//!
//! The classifier maps a raw user URL to a [`Platform`] using a static host
//! table and, in strict mode, per-platform path rules. It also produces the
//! normalized form used as the deduplication key.

use url::Url;

use crate::error::ClassifyError;
use crate::models::Platform;

// ============================================================================
// Tables
// ============================================================================

/// Registrable domains and the platform they belong to.
const HOST_TABLE: &[(&str, Platform)] = &[
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
    ("youtube-nocookie.com", Platform::YouTube),
    ("tiktok.com", Platform::TikTok),
    ("instagram.com", Platform::Instagram),
    ("facebook.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
    ("fb.com", Platform::Facebook),
];

/// Query parameters that only carry tracking state.
const TRACKING_PARAMS: &[&str] = &[
    "si",
    "feature",
    "fbclid",
    "gclid",
    "igshid",
    "igsh",
    "is_from_webapp",
    "sender_device",
    "_r",
    "_t",
    "mibextid",
    "ref",
    "pp",
];

// ============================================================================
// Classified URL
// ============================================================================

/// A URL that has been routed to a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedUrl {
    /// The platform the URL belongs to.
    pub platform: Platform,
    /// Normalized URL for deduplication.
    pub normalized: String,
}

// ============================================================================
// Classifier
// ============================================================================

/// Maps raw URLs to platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    strict: bool,
}

impl Classifier {
    /// Creates a classifier with strict path validation.
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Creates a classifier that routes on host alone.
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Enables or disables strict path validation.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns true if path validation is enabled.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Classifies `raw` and returns its platform and normalized form.
    ///
    /// # Errors
    ///
    /// - [`ClassifyError::InvalidUrl`] if the input does not parse as an
    ///   http(s) URL with a host.
    /// - [`ClassifyError::UnsupportedUrl`] if the host is not in the table,
    ///   or strict mode rejects the path.
    pub fn classify(&self, raw: &str) -> Result<ClassifiedUrl, ClassifyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClassifyError::InvalidUrl("empty URL".to_string()));
        }

        let url = Url::parse(trimmed).map_err(|e| ClassifyError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClassifyError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ClassifyError::InvalidUrl("URL has no host".to_string()))?;
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

        let platform = platform_for_host(&host)
            .ok_or_else(|| ClassifyError::UnsupportedUrl(format!("unsupported host: {host}")))?;

        if self.strict && !path_matches(platform, &host, &url) {
            return Err(ClassifyError::UnsupportedUrl(format!(
                "{} URL does not point to a video: {}",
                platform.display_name(),
                url.path()
            )));
        }

        let normalized = normalize(url, &host, platform)?;
        Ok(ClassifiedUrl {
            platform,
            normalized,
        })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Host & Path Rules
// ============================================================================

fn platform_for_host(host: &str) -> Option<Platform> {
    HOST_TABLE.iter().find_map(|(domain, platform)| {
        let matched = host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'));
        matched.then_some(*platform)
    })
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default()
}

/// Returns true if `name` appears as a segment followed by a non-empty id.
fn has_segment_with_id(segs: &[&str], names: &[&str]) -> bool {
    segs.windows(2).any(|w| names.contains(&w[0]))
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn path_matches(platform: Platform, host: &str, url: &Url) -> bool {
    let segs = segments(url);
    match platform {
        Platform::YouTube => {
            if host == "youtu.be" {
                return !segs.is_empty();
            }
            match segs.first().copied() {
                Some("watch") => query_value(url, "v").is_some(),
                Some("shorts" | "live" | "embed" | "v") => segs.len() >= 2,
                _ => false,
            }
        }
        Platform::TikTok => {
            if host.starts_with("vm.") || host.starts_with("vt.") {
                return !segs.is_empty();
            }
            has_segment_with_id(&segs, &["video", "t"])
                || segs.iter().any(|s| s.len() > 1 && s.starts_with('@'))
        }
        Platform::Instagram => has_segment_with_id(&segs, &["p", "reel", "reels", "tv"]),
        Platform::Facebook => {
            if host == "fb.watch" {
                return !segs.is_empty();
            }
            matches!(segs.first().copied(), Some("watch" | "share"))
                || has_segment_with_id(&segs, &["videos", "reel"])
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Produces the deduplication form of a classified URL.
fn normalize(mut url: Url, host: &str, platform: Platform) -> Result<String, ClassifyError> {
    // youtu.be/<id> and m.youtube.com point at the same watch page.
    if platform == Platform::YouTube && host == "youtu.be" {
        if let Some(id) = segments(&url).first().map(|s| (*s).to_string()) {
            url.set_path("/watch");
            let mut extra: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            extra.push(("v".to_string(), id));
            url.query_pairs_mut().clear().extend_pairs(extra);
        }
    }
    let host = match (platform, host) {
        (Platform::YouTube, "youtu.be" | "m.youtube.com") => "youtube.com",
        (_, h) => h,
    };

    url.set_host(Some(host))
        .map_err(|e| ClassifyError::InvalidUrl(e.to_string()))?;
    if url.scheme() == "http" {
        // Both are special schemes, so this cannot fail.
        let _ = url.set_scheme("https");
    }
    url.set_fragment(None);
    let _ = url.set_port(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url.to_string())
}

// ============================================================================
// Tests
// ============================================================================
