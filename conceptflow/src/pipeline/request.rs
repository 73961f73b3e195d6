//! Pipeline invocation requests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::SkipPolicy;
use crate::core::PipelineStage;
use crate::stages::{DocumentBundle, DocumentSource, InputSource, StageConfig};

/// A request to run the pipeline for one process.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    /// The process name. The orchestrator's default process when `None`.
    pub process: Option<String>,
    /// Optional human-readable name stored on the process.
    pub display_name: Option<String>,
    /// Per-stage configuration. Missing stages get an empty config.
    pub configs: BTreeMap<PipelineStage, StageConfig>,
    /// Skip/overwrite policy.
    pub policy: SkipPolicy,
    /// Restricts the invocation to these stages. All stages when `None`.
    pub targets: Option<BTreeSet<PipelineStage>>,
    /// Block until the pipeline reaches a terminal state.
    pub wait_for_completion: bool,
    /// Input documents for the `Data` stage.
    pub input: Option<InputSource>,
}

impl PipelineRequest {
    /// Creates a request for the default process.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request for a named process.
    #[must_use]
    pub fn for_process(process: impl Into<String>) -> Self {
        Self {
            process: Some(process.into()),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the configuration of a stage.
    #[must_use]
    pub fn with_config(mut self, stage: PipelineStage, config: StageConfig) -> Self {
        self.configs.insert(stage, config);
        self
    }

    /// Sets the skip/overwrite policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SkipPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets whether present artifacts are reused.
    #[must_use]
    pub fn with_skip_present(mut self, skip_present: bool) -> Self {
        self.policy.skip_present = skip_present;
        self
    }

    /// Omits a stage.
    #[must_use]
    pub fn omit(mut self, stage: PipelineStage) -> Self {
        self.policy.omitted.insert(stage);
        self
    }

    /// Restricts the invocation to the given stages.
    ///
    /// Targets still run in pipeline order and under the same rules.
    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = PipelineStage>) -> Self {
        self.targets = Some(targets.into_iter().collect());
        self
    }

    /// Sets whether the caller waits for the terminal state.
    #[must_use]
    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    /// Supplies the input documents.
    #[must_use]
    pub fn with_documents(mut self, bundle: DocumentBundle) -> Self {
        self.input = Some(InputSource::from(bundle));
        self
    }

    /// Supplies a source the `Data` stage fetches its documents from.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.input = Some(InputSource::Source(source));
        self
    }

    /// Returns the stages this request runs, in pipeline order.
    #[must_use]
    pub fn stages(&self) -> Vec<PipelineStage> {
        PipelineStage::ALL
            .into_iter()
            .filter(|stage| self.targets.as_ref().map_or(true, |t| t.contains(stage)))
            .collect()
    }

    /// Returns true if the `Data` stage will execute regardless of stored
    /// artifacts.
    #[must_use]
    pub fn always_runs_data(&self) -> bool {
        self.stages().contains(&PipelineStage::Data)
            && !self.policy.is_omitted(PipelineStage::Data)
            && !self.policy.skip_present
    }
}
