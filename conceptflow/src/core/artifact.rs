//! The durable output of a stage.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::PipelineStage;

/// An artifact produced by a stage and addressed by (process, stage).
///
/// The orchestrator treats `payload` as opaque. Only the stage that
/// produced it and the stage right after it know its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// The process this artifact belongs to.
    pub process: String,

    /// The stage that produced the artifact.
    pub stage: PipelineStage,

    /// The stage-specific content.
    pub payload: serde_json::Value,

    /// Additional metadata about the artifact.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// When the artifact was created (ISO 8601).
    pub created_at: String,
}

impl Artifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(process: impl Into<String>, stage: PipelineStage, payload: serde_json::Value) -> Self {
        Self {
            process: process.into(),
            stage,
            payload,
            metadata: BTreeMap::new(),
            created_at: crate::utils::iso_timestamp(),
        }
    }

    /// Adds metadata to the artifact.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Deserializes the payload into a stage-specific type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Serializes the artifact to its stored byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses an artifact from its stored byte form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Returns the hex SHA-256 digest of `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
