use crate::domain::entities::writer::Writer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// How the re-embedding pass decides which writers need a new vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalenessPolicy {
    /// Re-embed every writer on every pass.
    #[default]
    AlwaysRecompute,
    /// Re-embed only writers whose marker no longer matches the model and text.
    MarkerBased,
}

impl StalenessPolicy {
    pub fn needs_embedding(&self, writer: &Writer, model_version: &str) -> bool {
        match self {
            StalenessPolicy::AlwaysRecompute => true,
            StalenessPolicy::MarkerBased => {
                !writer.has_embedding()
                    || writer.embedding_marker.as_deref()
                        != Some(embedding_marker(model_version, &writer.description).as_str())
            }
        }
    }
}

impl fmt::Display for StalenessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StalenessPolicy::AlwaysRecompute => write!(f, "always-recompute"),
            StalenessPolicy::MarkerBased => write!(f, "marker-based"),
        }
    }
}

impl FromStr for StalenessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always-recompute" | "always" => Ok(StalenessPolicy::AlwaysRecompute),
            "marker-based" | "marker" => Ok(StalenessPolicy::MarkerBased),
            _ => Err(format!("Unknown staleness policy: {s}")),
        }
    }
}

/// Marker stored next to an embedding: `<model_version>#<first 16 hex of sha256(text)>`.
pub fn embedding_marker(model_version: &str, description: &str) -> String {
    let digest = Sha256::digest(description.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{model_version}#{hex}")
}
