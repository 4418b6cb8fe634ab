//! Requested quality hints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QualityError;

/// Lowest height accepted as a quality cap.
const MIN_HEIGHT: u32 = 144;
/// Highest height accepted as a quality cap (8K).
const MAX_HEIGHT: u32 = 4320;

/// Requested output quality.
///
/// Serialized as a string: `"best"`, `"audio"`, or `"<height>p"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Quality {
    /// Best available video with audio.
    #[default]
    Best,
    /// Audio only.
    Audio,
    /// Best video no taller than the given height.
    MaxHeight(u32),
}

impl FromStr for Quality {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "best" | "" => return Ok(Self::Best),
            "audio" | "audio-only" | "audioonly" => return Ok(Self::Audio),
            _ => {}
        }

        let digits = value.strip_suffix('p').unwrap_or(&value);
        match digits.parse::<u32>() {
            Ok(h) if (MIN_HEIGHT..=MAX_HEIGHT).contains(&h) => Ok(Self::MaxHeight(h)),
            _ => Err(QualityError(s.to_string())),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => f.write_str("best"),
            Self::Audio => f.write_str("audio"),
            Self::MaxHeight(h) => write!(f, "{h}p"),
        }
    }
}

impl TryFrom<String> for Quality {
    type Error = QualityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quality> for String {
    fn from(q: Quality) -> Self {
        q.to_string()
    }
}
