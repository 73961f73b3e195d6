//! Durable storage of stage artifacts.
//!
//! A store holds at most one artifact per (process, stage) and knows nothing
//! about stage semantics. Existence is the only signal the orchestrator
//! uses to decide between skipping, overwriting and running a stage.

mod fs;
mod memory;

pub use fs::FsArtifactStore;
pub use memory::InMemoryArtifactStore;

use async_trait::async_trait;

use crate::core::{Artifact, PipelineStage};
use crate::errors::StoreError;

/// Storage backend for stage artifacts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns whether an artifact exists for (process, stage).
    async fn exists(&self, process: &str, stage: PipelineStage) -> Result<bool, StoreError>;

    /// Loads the artifact for (process, stage).
    ///
    /// Fails with `StoreError::NotFound` if absent.
    async fn load(&self, process: &str, stage: PipelineStage) -> Result<Artifact, StoreError>;

    /// Saves an artifact under its own (process, stage) key.
    ///
    /// Replaces any prior artifact for the key. Readers never observe a
    /// partially written artifact.
    async fn save(&self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Deletes the artifact for (process, stage). A no-op if absent.
    async fn delete(&self, process: &str, stage: PipelineStage) -> Result<(), StoreError>;

    /// Lists the names of processes with at least one stored artifact.
    async fn list_processes(&self) -> Result<Vec<String>, StoreError>;

    /// Returns the stages of a process that have an artifact, in pipeline order.
    async fn stored_stages(&self, process: &str) -> Result<Vec<PipelineStage>, StoreError> {
        let mut stages = Vec::new();
        for stage in PipelineStage::ALL {
            if self.exists(process, stage).await? {
                stages.push(stage);
            }
        }
        Ok(stages)
    }
}
