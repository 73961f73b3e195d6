//! In-memory registry of processes and their stage statuses.
//!
//! The registry is the only state shared between running pipelines and
//! status queries. Entries are locked individually, so pipelines for
//! different processes never contend with each other.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{PipelineStage, ProcessView, StageStatus};
use crate::errors::{ConceptflowError, NotFoundError, StoreError};
use crate::store::ArtifactStore;
use crate::utils::iso_timestamp;

#[derive(Debug, Clone)]
struct ProcessEntry {
    display_name: Option<String>,
    created_at: String,
    updated_at: String,
    run_id: Option<Uuid>,
    running: bool,
    stages: BTreeMap<PipelineStage, StageStatus>,
    errors: BTreeMap<PipelineStage, String>,
}

impl ProcessEntry {
    fn new() -> Self {
        let now = iso_timestamp();
        Self {
            display_name: None,
            created_at: now.clone(),
            updated_at: now,
            run_id: None,
            running: false,
            stages: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = iso_timestamp();
    }

    fn view(&self, name: &str) -> ProcessView {
        ProcessView {
            name: name.to_string(),
            display_name: self.display_name.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            run_id: self.run_id,
            running: self.running,
            stages: self.stages.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Registry of known processes.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    entries: DashMap<String, ProcessEntry>,
}

impl ProcessRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a process. Idempotent: an existing entry is left as is.
    ///
    /// Returns true if the process was newly created.
    pub fn register(&self, name: &str) -> bool {
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(ProcessEntry::new());
                debug!(process = name, "Registered process");
                true
            }
        }
    }

    /// Sets the display name of a registered process.
    pub fn set_display_name(
        &self,
        name: &str,
        display_name: Option<String>,
    ) -> Result<(), NotFoundError> {
        let mut entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| NotFoundError::process(name))?;
        entry.display_name = display_name;
        entry.touch();
        Ok(())
    }

    /// Sets the status of one stage.
    ///
    /// Any error message recorded for the stage is cleared.
    pub fn set_status(
        &self,
        name: &str,
        stage: PipelineStage,
        status: StageStatus,
    ) -> Result<(), NotFoundError> {
        let mut entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| NotFoundError::process(name))?;
        entry.stages.insert(stage, status);
        entry.errors.remove(&stage);
        entry.touch();
        debug!(process = name, stage = %stage, status = %status, "Stage status changed");
        Ok(())
    }

    /// Marks a stage as `Error` and records why.
    pub fn record_error(
        &self,
        name: &str,
        stage: PipelineStage,
        message: impl Into<String>,
    ) -> Result<(), NotFoundError> {
        let mut entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| NotFoundError::process(name))?;
        entry.stages.insert(stage, StageStatus::Error);
        entry.errors.insert(stage, message.into());
        entry.touch();
        debug!(process = name, stage = %stage, "Stage marked as error");
        Ok(())
    }

    /// Returns a copy of a process entry.
    #[must_use]
    pub fn snapshot(&self, name: &str) -> Option<ProcessView> {
        self.entries.get(name).map(|entry| entry.view(name))
    }

    /// Returns true if the process is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns copies of all entries, sorted by name.
    #[must_use]
    pub fn list_all(&self) -> Vec<ProcessView> {
        let mut views: Vec<ProcessView> = self
            .entries
            .iter()
            .map(|entry| entry.value().view(entry.key()))
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }

    /// Returns the number of registered processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no process is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers the process if needed and marks an invocation in flight.
    ///
    /// Fails with `ProcessBusy` if another invocation for the same name has
    /// not finished yet. The returned guard clears the flag when dropped.
    pub fn begin_run(
        self: &Arc<Self>,
        name: &str,
        run_id: Uuid,
    ) -> Result<RunGuard, ConceptflowError> {
        let mut entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(ProcessEntry::new);
        if entry.running {
            return Err(ConceptflowError::ProcessBusy {
                process: name.to_string(),
            });
        }
        entry.running = true;
        entry.run_id = Some(run_id);
        entry.touch();
        drop(entry);

        Ok(RunGuard {
            registry: Arc::clone(self),
            process: name.to_string(),
        })
    }

    fn end_run(&self, name: &str) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.running = false;
            entry.touch();
        }
    }

    /// Registers every process found in the store and marks each stage
    /// with an artifact as `Finished`.
    ///
    /// Processes that are already registered are left untouched. Returns
    /// the number of processes added.
    pub async fn rehydrate(&self, store: &dyn ArtifactStore) -> Result<usize, StoreError> {
        let mut added = 0;
        for name in store.list_processes().await? {
            if self.contains(&name) {
                continue;
            }
            let stages = store.stored_stages(&name).await?;
            if let Entry::Vacant(vacant) = self.entries.entry(name.clone()) {
                let mut entry = ProcessEntry::new();
                for stage in stages {
                    entry.stages.insert(stage, StageStatus::Finished);
                }
                vacant.insert(entry);
                added += 1;
            }
        }
        info!(processes = added, "Rehydrated process registry from artifact store");
        Ok(added)
    }
}

/// Marks an invocation in flight for as long as it is alive.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<ProcessRegistry>,
    process: String,
}

impl RunGuard {
    /// Returns the process name.
    #[must_use]
    pub fn process(&self) -> &str {
        &self.process
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.end_run(&self.process);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Artifact;
    use crate::store::InMemoryArtifactStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_register_is_idempotent() {
        let registry = ProcessRegistry::new();
        assert!(registry.register("corpus1"));
        registry
            .set_status("corpus1", PipelineStage::Data, StageStatus::Finished)
            .unwrap();

        assert!(!registry.register("corpus1"));
        let view = registry.snapshot("corpus1").unwrap();
        assert_eq!(view.status(PipelineStage::Data), Some(StageStatus::Finished));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_status_unknown_process() {
        let registry = ProcessRegistry::new();
        let err = registry
            .set_status("ghost", PipelineStage::Data, StageStatus::Started)
            .unwrap_err();
        assert_eq!(err, NotFoundError::process("ghost"));
        assert!(registry.snapshot("ghost").is_none());
    }

    #[test]
    fn test_record_error_then_recover() {
        let registry = ProcessRegistry::new();
        registry.register("p");
        registry
            .record_error("p", PipelineStage::Embedding, "model unavailable")
            .unwrap();

        let view = registry.snapshot("p").unwrap();
        assert_eq!(view.status(PipelineStage::Embedding), Some(StageStatus::Error));
        assert_eq!(
            view.errors.get(&PipelineStage::Embedding).map(String::as_str),
            Some("model unavailable")
        );

        registry
            .set_status("p", PipelineStage::Embedding, StageStatus::Finished)
            .unwrap();
        let view = registry.snapshot("p").unwrap();
        assert!(view.errors.is_empty());
    }

    #[test]
    fn test_list_all_sorted() {
        let registry = ProcessRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(name);
        }
        let names: Vec<String> = registry.list_all().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_begin_run_rejects_second_invocation() {
        let registry = Arc::new(ProcessRegistry::new());
        let guard = registry.begin_run("p", Uuid::new_v4()).unwrap();
        assert!(registry.snapshot("p").unwrap().running);

        let err = registry.begin_run("p", Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), "PROCESS_BUSY");

        assert!(registry.begin_run("other", Uuid::new_v4()).is_ok());

        drop(guard);
        assert!(!registry.snapshot("p").unwrap().running);
        assert!(registry.begin_run("p", Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_concurrent_status_writers() {
        let registry = Arc::new(ProcessRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let name = format!("p{}", i % 4);
                    registry.register(&name);
                    for stage in PipelineStage::ALL {
                        registry.set_status(&name, stage, StageStatus::Finished).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 4);
        assert!(registry.list_all().iter().all(ProcessView::is_complete));
    }

    #[tokio::test]
    async fn test_rehydrate_from_store() {
        let store = InMemoryArtifactStore::new();
        for stage in [PipelineStage::Data, PipelineStage::Embedding] {
            store
                .save(&Artifact::new("stored", stage, json!({})))
                .await
                .unwrap();
        }
        store
            .save(&Artifact::new("known", PipelineStage::Data, json!({})))
            .await
            .unwrap();

        let registry = ProcessRegistry::new();
        registry.register("known");

        let added = registry.rehydrate(&store).await.unwrap();
        assert_eq!(added, 1);

        let stored = registry.snapshot("stored").unwrap();
        assert_eq!(stored.status(PipelineStage::Data), Some(StageStatus::Finished));
        assert_eq!(stored.status(PipelineStage::Embedding), Some(StageStatus::Finished));
        assert_eq!(stored.status(PipelineStage::Clustering), None);

        let known = registry.snapshot("known").unwrap();
        assert!(known.stages.is_empty());
    }
}
