//! In-memory artifact store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use super::ArtifactStore;
use crate::core::{Artifact, PipelineStage};
use crate::errors::{NotFoundError, StoreError};

/// A non-durable store keeping serialized artifacts in a map.
///
/// Artifacts are stored in their serialized form so that reads return the
/// exact bytes that were written.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    entries: RwLock<HashMap<(String, PipelineStage), Vec<u8>>>,
}

impl InMemoryArtifactStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the stored bytes for (process, stage).
    #[must_use]
    pub fn raw(&self, process: &str, stage: PipelineStage) -> Option<Vec<u8>> {
        self.entries.read().get(&(process.to_string(), stage)).cloned()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn exists(&self, process: &str, stage: PipelineStage) -> Result<bool, StoreError> {
        Ok(self.entries.read().contains_key(&(process.to_string(), stage)))
    }

    async fn load(&self, process: &str, stage: PipelineStage) -> Result<Artifact, StoreError> {
        let bytes = self
            .raw(process, stage)
            .ok_or_else(|| NotFoundError::artifact(process, stage))?;
        Artifact::from_bytes(&bytes).map_err(|e| StoreError::Corrupt {
            process: process.to_string(),
            stage,
            reason: e.to_string(),
        })
    }

    async fn save(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let bytes = artifact.to_bytes()?;
        self.entries
            .write()
            .insert((artifact.process.clone(), artifact.stage), bytes);
        Ok(())
    }

    async fn delete(&self, process: &str, stage: PipelineStage) -> Result<(), StoreError> {
        self.entries.write().remove(&(process.to_string(), stage));
        Ok(())
    }

    async fn list_processes(&self) -> Result<Vec<String>, StoreError> {
        let names: BTreeSet<String> = self
            .entries
            .read()
            .keys()
            .map(|(process, _)| process.clone())
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = InMemoryArtifactStore::new();
        let artifact = Artifact::new("p", PipelineStage::Embedding, json!({"dims": 384}));

        store.save(&artifact).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.exists("p", PipelineStage::Embedding).await.unwrap());
        assert!(!store.exists("p", PipelineStage::Data).await.unwrap());
        assert_eq!(store.load("p", PipelineStage::Embedding).await.unwrap(), artifact);

        store.delete("p", PipelineStage::Embedding).await.unwrap();
        store.delete("p", PipelineStage::Embedding).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_listing() {
        let store = InMemoryArtifactStore::new();
        for (process, stage) in [
            ("b", PipelineStage::Data),
            ("a", PipelineStage::Graph),
            ("b", PipelineStage::Clustering),
        ] {
            store.save(&Artifact::new(process, stage, json!(null))).await.unwrap();
        }

        assert_eq!(store.list_processes().await.unwrap(), vec!["a", "b"]);
        assert_eq!(
            store.stored_stages("b").await.unwrap(),
            vec![PipelineStage::Data, PipelineStage::Clustering]
        );
    }
}
