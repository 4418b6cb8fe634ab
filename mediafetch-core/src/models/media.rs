//! Media references and artifact identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a locally stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Wraps an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the extracted media can be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaRef {
    /// A direct media URL, playable without local storage.
    Remote {
        /// The direct media URL.
        url: String,
    },
    /// A downloaded file held by the artifact store.
    Local {
        /// The artifact to fetch.
        #[serde(rename = "artifactId")]
        artifact_id: ArtifactId,
    },
}

impl MediaRef {
    /// Returns the artifact id for local media.
    pub fn artifact_id(&self) -> Option<&ArtifactId> {
        match self {
            Self::Local { artifact_id } => Some(artifact_id),
            Self::Remote { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_ref_wire_shape() {
        let remote = MediaRef::Remote {
            url: "https://cdn.example.com/v.mp4".to_string(),
        };
        let json = serde_json::to_value(&remote).unwrap();
        assert_eq!(json["kind"], "remote");
        assert_eq!(json["url"], "https://cdn.example.com/v.mp4");

        let local = MediaRef::Local {
            artifact_id: ArtifactId::new("abc"),
        };
        let json = serde_json::to_value(&local).unwrap();
        assert_eq!(json["kind"], "local");
        assert_eq!(json["artifactId"], "abc");
        assert_eq!(local.artifact_id().map(ArtifactId::as_str), Some("abc"));
    }
}
