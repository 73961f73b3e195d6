//! The public entry point: start pipelines and query process status.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::OrchestratorConfig;
use crate::core::{Artifact, PipelineStage, ProcessView, StoredProcess};
use crate::errors::{ConceptflowError, NotFoundError, StoreError};
use crate::events::EventSink;
use crate::pipeline::{
    PipelineCoordinator, PipelineHandle, PipelineReport, PipelineRequest, StageRunner,
};
use crate::registry::ProcessRegistry;
use crate::stages::StageSet;
use crate::store::{ArtifactStore, FsArtifactStore};
use crate::utils::validate_process_name;

/// Result of [`Orchestrator::start_pipeline`].
#[derive(Debug)]
pub enum PipelineStart {
    /// The pipeline runs in the background.
    Accepted {
        /// Handle to join or cancel the pipeline.
        handle: PipelineHandle,
    },
    /// The caller asked to wait; the pipeline reached a terminal state.
    Completed {
        /// What happened to each stage.
        report: PipelineReport,
        /// The process status after the run.
        view: ProcessView,
    },
}

impl PipelineStart {
    /// Returns the report if the pipeline already completed.
    #[must_use]
    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            Self::Completed { report, .. } => Some(report),
            Self::Accepted { .. } => None,
        }
    }

    /// Waits for the pipeline and returns its report.
    pub async fn into_report(self) -> Result<PipelineReport, ConceptflowError> {
        match self {
            Self::Accepted { handle } => handle.join().await,
            Self::Completed { report, .. } => Ok(report),
        }
    }
}

/// Orchestrates the concept pipeline over an artifact store.
#[derive(Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn ArtifactStore>,
    registry: Arc<ProcessRegistry>,
    coordinator: PipelineCoordinator,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("processes", &self.registry.len())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over the given store.
    ///
    /// The registry starts empty; call [`rehydrate`](Self::rehydrate) to
    /// load processes that already have artifacts.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn ArtifactStore>,
        stages: StageSet,
    ) -> Result<Self, ConceptflowError> {
        config.validate()?;
        let registry = Arc::new(ProcessRegistry::new());
        let runner = StageRunner::new(Arc::clone(&store), Arc::clone(&registry), stages)
            .with_stage_timeout(config.stage_timeout());
        let coordinator = PipelineCoordinator::new(runner, Arc::clone(&registry))
            .with_max_concurrent(config.max_concurrent_pipelines);

        Ok(Self {
            config,
            store,
            registry,
            coordinator,
        })
    }

    /// Opens an orchestrator over the filesystem store at
    /// `config.storage_root`, rehydrating the registry if configured.
    pub async fn open(
        config: OrchestratorConfig,
        stages: StageSet,
    ) -> Result<Self, ConceptflowError> {
        let store = FsArtifactStore::open(&config.storage_root).await?;
        info!(root = %config.storage_root.display(), "Opened artifact store");
        let orchestrator = Self::new(config, Arc::new(store), stages)?;
        if orchestrator.config.rehydrate_on_start {
            orchestrator.rehydrate().await?;
        }
        Ok(orchestrator)
    }

    /// Sets the event sink receiving pipeline events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.coordinator = self.coordinator.with_event_sink(events);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the process registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Returns the artifact store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Registers every process found in the store. Returns how many were
    /// added.
    pub async fn rehydrate(&self) -> Result<usize, StoreError> {
        self.registry.rehydrate(self.store.as_ref()).await
    }

    /// Validates and starts a pipeline.
    ///
    /// Returns `Accepted` right away, or `Completed` once the pipeline is
    /// terminal if the request asked to wait. Stage failures are part of
    /// the report, never an `Err`.
    pub async fn start_pipeline(
        &self,
        mut request: PipelineRequest,
    ) -> Result<PipelineStart, ConceptflowError> {
        let process = request
            .process
            .clone()
            .unwrap_or_else(|| self.config.default_process.clone());
        for stage in PipelineStage::ALL {
            let config = request.configs.remove(&stage).unwrap_or_default();
            request
                .configs
                .insert(stage, config.or_language(self.config.language));
        }
        let wait = request.wait_for_completion;

        let handle = self.coordinator.start(&process, request)?;
        if !wait {
            return Ok(PipelineStart::Accepted { handle });
        }

        let report = handle.join().await?;
        let view = self.get_status(&process)?;
        Ok(PipelineStart::Completed { report, view })
    }

    /// Returns the status of a process.
    pub fn get_status(&self, process: &str) -> Result<ProcessView, NotFoundError> {
        self.registry
            .snapshot(process)
            .ok_or_else(|| NotFoundError::process(process))
    }

    /// Returns the status of every known process, sorted by name.
    #[must_use]
    pub fn list_processes(&self) -> Vec<ProcessView> {
        self.registry.list_all()
    }

    /// Lists the processes in the artifact store with their stored stages.
    pub async fn list_stored_processes(&self) -> Result<Vec<StoredProcess>, StoreError> {
        let mut processes = Vec::new();
        for name in self.store.list_processes().await? {
            let stages = self.store.stored_stages(&name).await?;
            processes.push(StoredProcess { name, stages });
        }
        processes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(processes)
    }

    /// Loads a stored artifact through its stage contract.
    pub async fn load_artifact(
        &self,
        process: &str,
        stage: PipelineStage,
    ) -> Result<Artifact, ConceptflowError> {
        validate_process_name(process)?;
        debug!(process, stage = %stage, "Loading artifact");
        self.coordinator.runner().load_stored(process, stage).await
    }
}
