//! The fixed stage enumeration of the concept pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four pipeline stages.
///
/// The declaration order is the execution order. `Data` has no upstream,
/// every later stage consumes the artifact of the stage right before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Document preparation (tokenization, phrase extraction).
    Data,
    /// Phrase embedding.
    Embedding,
    /// Concept clustering of the embedded phrases.
    Clustering,
    /// Concept graph creation.
    Graph,
}

impl PipelineStage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Data, Self::Embedding, Self::Clustering, Self::Graph];

    /// Returns the 1-based position of the stage in the pipeline.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Data => 1,
            Self::Embedding => 2,
            Self::Clustering => 3,
            Self::Graph => 4,
        }
    }

    /// Returns the stage whose artifact this stage consumes.
    #[must_use]
    pub const fn upstream(self) -> Option<Self> {
        match self {
            Self::Data => None,
            Self::Embedding => Some(Self::Data),
            Self::Clustering => Some(Self::Embedding),
            Self::Graph => Some(Self::Clustering),
        }
    }

    /// Returns the stage that consumes this stage's artifact.
    #[must_use]
    pub const fn downstream(self) -> Option<Self> {
        match self {
            Self::Data => Some(Self::Embedding),
            Self::Embedding => Some(Self::Clustering),
            Self::Clustering => Some(Self::Graph),
            Self::Graph => None,
        }
    }

    /// Returns the lowercase stage name used in keys and file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Embedding => "embedding",
            Self::Clustering => "clustering",
            Self::Graph => "graph",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stage name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown pipeline stage '{0}' (expected one of: data, embedding, clustering, graph)")]
pub struct UnknownStageError(pub String);

impl FromStr for PipelineStage {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" | "preprocessing" => Ok(Self::Data),
            "embedding" => Ok(Self::Embedding),
            "clustering" => Ok(Self::Clustering),
            "graph" => Ok(Self::Graph),
            _ => Err(UnknownStageError(s.to_string())),
        }
    }
}
