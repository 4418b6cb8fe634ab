//! JSON output formatting.

use anyhow::Result;
use mediafetch_core::{Platform, Quality};
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for `classify`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyOutput {
    pub platform: Platform,
    pub normalized_url: String,
    pub chain: Vec<String>,
}

/// JSON output for one entry of `platforms`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOutput {
    pub platform: Platform,
    pub display_name: String,
    pub default_quality: Quality,
    pub sample_url: String,
    pub chain: Vec<String>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(data)?)
        } else {
            Ok(serde_json::to_string(data)?)
        }
    }
}
