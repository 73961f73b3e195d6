//! Filesystem-backed artifact store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::ArtifactStore;
use crate::core::{checksum, Artifact, PipelineStage};
use crate::errors::{NotFoundError, StoreError};
use crate::utils::validate_process_name;

/// On-disk envelope around an artifact.
#[derive(Debug, Serialize, Deserialize)]
struct StoredArtifact {
    /// SHA-256 of the serialized `artifact`.
    checksum: String,
    artifact: Artifact,
}

/// Stores artifacts as `<root>/<process>/<process>_<stage>.json`.
///
/// Writes go to a temporary file in the same directory which is flushed to
/// disk and then renamed over the final path.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store rooted at `root`, creating the directory now.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(root);
        tokio::fs::create_dir_all(&store.root).await?;
        Ok(store)
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding a process's artifacts.
    #[must_use]
    pub fn process_dir(&self, process: &str) -> PathBuf {
        self.root.join(process)
    }

    /// Returns the path of the artifact for (process, stage).
    #[must_use]
    pub fn artifact_path(&self, process: &str, stage: PipelineStage) -> PathBuf {
        self.process_dir(process)
            .join(format!("{process}_{}.json", stage.as_str()))
    }

    fn corrupt(process: &str, stage: PipelineStage, reason: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            process: process.to_string(),
            stage,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn exists(&self, process: &str, stage: PipelineStage) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.artifact_path(process, stage)).await?)
    }

    async fn load(&self, process: &str, stage: PipelineStage) -> Result<Artifact, StoreError> {
        let path = self.artifact_path(process, stage);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(NotFoundError::artifact(process, stage).into());
            }
            Err(e) => return Err(e.into()),
        };

        let stored: StoredArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| Self::corrupt(process, stage, format!("unreadable envelope: {e}")))?;

        let actual = checksum(&stored.artifact.to_bytes()?);
        if actual != stored.checksum {
            return Err(Self::corrupt(process, stage, "checksum mismatch"));
        }
        if stored.artifact.process != process || stored.artifact.stage != stage {
            return Err(Self::corrupt(
                process,
                stage,
                format!(
                    "file holds the '{}' artifact of process '{}'",
                    stored.artifact.stage, stored.artifact.process
                ),
            ));
        }

        Ok(stored.artifact)
    }

    async fn save(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.artifact_path(&artifact.process, artifact.stage);
        let dir = self.process_dir(&artifact.process);
        tokio::fs::create_dir_all(&dir).await?;

        let envelope = StoredArtifact {
            checksum: checksum(&artifact.to_bytes()?),
            artifact: artifact.clone(),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let tmp_path = dir.join(format!(
            ".{}_{}.{}.tmp",
            artifact.process,
            artifact.stage.as_str(),
            Uuid::new_v4().simple()
        ));

        let write = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        };

        if let Err(e) = write.await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %cleanup, "Failed to remove temporary artifact file");
                }
            }
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = bytes.len(), "Artifact saved");
        Ok(())
    }

    async fn delete(&self, process: &str, stage: PipelineStage) -> Result<(), StoreError> {
        let path = self.artifact_path(process, stage);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Artifact deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_processes(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_process_name(&name).is_err() {
                continue;
            }
            if !self.stored_stages(&name).await?.is_empty() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(process: &str, stage: PipelineStage) -> Artifact {
        Artifact::new(process, stage, json!({"stage": stage.as_str(), "items": [1, 2, 3]}))
    }

    #[test]
    fn test_artifact_path_layout() {
        let store = FsArtifactStore::new("/data");
        assert_eq!(
            store.artifact_path("corpus1", PipelineStage::Embedding),
            PathBuf::from("/data/corpus1/corpus1_embedding.json")
        );
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::open(dir.path()).await.unwrap();
        let original = artifact("corpus1", PipelineStage::Data);

        assert!(!store.exists("corpus1", PipelineStage::Data).await.unwrap());
        store.save(&original).await.unwrap();
        assert!(store.exists("corpus1", PipelineStage::Data).await.unwrap());

        let loaded = store.load("corpus1", PipelineStage::Data).await.unwrap();
        assert_eq!(loaded, original);

        store.delete("corpus1", PipelineStage::Data).await.unwrap();
        assert!(!store.exists("corpus1", PipelineStage::Data).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let err = store.load("nope", PipelineStage::Graph).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(NotFoundError::Artifact { .. })));
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.delete("nope", PipelineStage::Data).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.save(&artifact("p", PipelineStage::Data)).await.unwrap();
        store.save(&artifact("p", PipelineStage::Data)).await.unwrap();

        let files: Vec<String> = std::fs::read_dir(store.process_dir("p"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["p_data.json".to_string()]);
    }

    #[tokio::test]
    async fn test_tampered_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.save(&artifact("p", PipelineStage::Clustering)).await.unwrap();

        let path = store.artifact_path("p", PipelineStage::Clustering);
        let tampered = std::fs::read_to_string(&path).unwrap().replace("[1,2,3]", "[1,2,4]");
        std::fs::write(&path, tampered).unwrap();

        let err = store.load("p", PipelineStage::Clustering).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        std::fs::write(&path, b"not json").unwrap();
        let err = store.load("p", PipelineStage::Clustering).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_list_processes_and_stored_stages() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(store.list_processes().await.unwrap().is_empty());

        store.save(&artifact("beta", PipelineStage::Data)).await.unwrap();
        store.save(&artifact("beta", PipelineStage::Embedding)).await.unwrap();
        store.save(&artifact("alpha", PipelineStage::Graph)).await.unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::create_dir_all(dir.path().join(".tmp_streams")).unwrap();

        assert_eq!(store.list_processes().await.unwrap(), vec!["alpha", "beta"]);
        assert_eq!(
            store.stored_stages("beta").await.unwrap(),
            vec![PipelineStage::Data, PipelineStage::Embedding]
        );
    }
}
