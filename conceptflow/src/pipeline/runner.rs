//! Executes one stage of one invocation.

use futures::FutureExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{SkipPolicy, StageDecision};
use crate::cancellation::CancellationToken;
use crate::core::{Artifact, PipelineStage, StageStatus};
use crate::errors::{ConceptflowError, NotFoundError, StageExecutionError, StoreError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::registry::ProcessRegistry;
use crate::stages::{InputSource, StageConfig, StageContext, StageInput, StageSet};
use crate::store::ArtifactStore;

/// Everything the runner needs to know about the current invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The process name.
    pub process: String,
    /// The invocation id.
    pub run_id: Uuid,
    /// Skip/overwrite policy.
    pub policy: SkipPolicy,
    /// Per-stage configuration.
    pub configs: BTreeMap<PipelineStage, StageConfig>,
    /// Input documents for the `Data` stage.
    pub input: Option<InputSource>,
    /// Cancellation token of the invocation.
    pub cancel: Arc<CancellationToken>,
}

impl Invocation {
    /// Creates an invocation with the default policy and no input.
    #[must_use]
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            run_id: Uuid::now_v7(),
            policy: SkipPolicy::default(),
            configs: BTreeMap::new(),
            input: None,
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SkipPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the input documents.
    #[must_use]
    pub fn with_input(mut self, input: InputSource) -> Self {
        self.input = Some(input);
        self
    }

    /// Sets the configuration of a stage.
    #[must_use]
    pub fn with_config(mut self, stage: PipelineStage, config: StageConfig) -> Self {
        self.configs.insert(stage, config);
        self
    }

    fn config(&self, stage: PipelineStage) -> StageConfig {
        self.configs.get(&stage).cloned().unwrap_or_default()
    }
}

/// What happened to a stage.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The existing artifact was reused.
    Skipped,
    /// The stage was omitted and had no artifact; its status is untouched.
    Omitted,
    /// A fresh artifact was produced and persisted.
    Produced {
        /// The new artifact.
        artifact: Artifact,
        /// Whether a previous artifact was deleted first.
        overwritten: bool,
        /// Time spent producing and persisting, in milliseconds.
        duration_ms: f64,
    },
}

impl StageOutcome {
    /// Returns the decision that led to this outcome.
    #[must_use]
    pub fn decision(&self) -> StageDecision {
        match self {
            Self::Skipped => StageDecision::Skip,
            Self::Omitted => StageDecision::Omit,
            Self::Produced {
                overwritten: true, ..
            } => StageDecision::Overwrite,
            Self::Produced { .. } => StageDecision::Run,
        }
    }
}

/// Decides and executes single stages.
#[derive(Clone)]
pub struct StageRunner {
    store: Arc<dyn ArtifactStore>,
    registry: Arc<ProcessRegistry>,
    stages: StageSet,
    events: Arc<dyn EventSink>,
    stage_timeout: Option<Duration>,
}

impl StageRunner {
    /// Creates a new runner.
    #[must_use]
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        registry: Arc<ProcessRegistry>,
        stages: StageSet,
    ) -> Self {
        Self {
            store,
            registry,
            stages,
            events: Arc::new(NoOpEventSink),
            stage_timeout: None,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Returns the stage implementations.
    #[must_use]
    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    /// Returns the artifact store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Runs one stage.
    ///
    /// `in_hand` is the upstream artifact if it was produced earlier in the
    /// same invocation. Any failure after the stage was touched is recorded
    /// as `Error` in the registry before it is returned.
    pub async fn run(
        &self,
        inv: &Invocation,
        stage: PipelineStage,
        in_hand: Option<Artifact>,
    ) -> Result<StageOutcome, ConceptflowError> {
        let omitted = inv.policy.is_omitted(stage);
        if !omitted {
            self.mark_started(inv, stage)?;
        }
        match self.decide_and_execute(inv, stage, omitted, in_hand).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.fail(inv, stage, &err);
                Err(err)
            }
        }
    }

    async fn decide_and_execute(
        &self,
        inv: &Invocation,
        stage: PipelineStage,
        omitted: bool,
        in_hand: Option<Artifact>,
    ) -> Result<StageOutcome, ConceptflowError> {
        let process = inv.process.as_str();
        let exists = self.store.exists(process, stage).await?;
        let decision = inv.policy.decide(stage, exists, in_hand.is_some());

        match decision {
            StageDecision::Omit => {
                debug!(process, stage = %stage, "Stage omitted and has no artifact");
                self.emit(PipelineEvent::StageOmitted {
                    process: process.to_string(),
                    run_id: inv.run_id,
                    stage,
                });
                Ok(StageOutcome::Omitted)
            }
            StageDecision::Skip => {
                if omitted {
                    self.mark_started(inv, stage)?;
                }
                self.registry.set_status(process, stage, StageStatus::Finished)?;
                info!(process, stage = %stage, "Artifact present, skipping stage");
                self.emit(PipelineEvent::StageSkipped {
                    process: process.to_string(),
                    run_id: inv.run_id,
                    stage,
                });
                Ok(StageOutcome::Skipped)
            }
            StageDecision::Overwrite => {
                // The existing artifact survives a run that cannot get its input.
                let started = Instant::now();
                let input = self.resolve_input(inv, stage, in_hand).await?;
                self.store.delete(process, stage).await?;
                info!(process, stage = %stage, "Deleted existing artifact for overwrite");
                self.emit(PipelineEvent::StageOverwrite {
                    process: process.to_string(),
                    run_id: inv.run_id,
                    stage,
                });
                self.produce(inv, stage, input, started, true).await
            }
            StageDecision::Run => {
                let started = Instant::now();
                let input = self.resolve_input(inv, stage, in_hand).await?;
                self.produce(inv, stage, input, started, false).await
            }
        }
    }

    async fn produce(
        &self,
        inv: &Invocation,
        stage: PipelineStage,
        input: StageInput,
        started: Instant,
        overwritten: bool,
    ) -> Result<StageOutcome, ConceptflowError> {
        let process = inv.process.as_str();
        let ctx = StageContext::new(
            process,
            stage,
            inv.run_id,
            inv.config(stage),
            Arc::clone(&inv.cancel),
        );
        debug!(process, stage = %stage, "Creating artifact");
        let contract = self.stages.get(stage);
        let payload = self.guarded(inv, stage, contract.create(&ctx, input)).await?;

        let artifact = Artifact::new(process, stage, payload)
            .with_metadata("run_id", json!(inv.run_id))
            .with_metadata("language", json!(ctx.language()));
        self.store
            .save(&artifact)
            .await
            .map_err(|source| ConceptflowError::ArtifactWrite {
                process: process.to_string(),
                stage,
                source,
            })?;
        self.registry.set_status(process, stage, StageStatus::Finished)?;

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(process, stage = %stage, duration_ms, "Stage finished");
        self.emit(PipelineEvent::StageFinished {
            process: process.to_string(),
            run_id: inv.run_id,
            stage,
            duration_ms,
        });
        Ok(StageOutcome::Produced {
            artifact,
            overwritten,
            duration_ms,
        })
    }

    async fn resolve_input(
        &self,
        inv: &Invocation,
        stage: PipelineStage,
        in_hand: Option<Artifact>,
    ) -> Result<StageInput, ConceptflowError> {
        let Some(upstream) = stage.upstream() else {
            let source = inv.input.as_ref().ok_or_else(|| {
                StageExecutionError::new(stage, "no input documents were supplied")
            })?;
            let bundle = self.guarded(inv, stage, source.resolve()).await?;
            return Ok(StageInput::Documents(bundle));
        };

        if let Some(artifact) = in_hand {
            return Ok(StageInput::Upstream(artifact));
        }

        let process = inv.process.as_str();
        if !self.store.exists(process, upstream).await? {
            return Err(ConceptflowError::MissingDependency {
                process: process.to_string(),
                stage,
                upstream,
            });
        }
        let artifact = self.load_stored(process, upstream).await?;
        Ok(StageInput::Upstream(artifact))
    }

    /// Loads a stored artifact and passes it through its stage's `load`.
    ///
    /// A corrupt artifact is reported as `NotFoundError::Unreadable`.
    pub async fn load_stored(
        &self,
        process: &str,
        stage: PipelineStage,
    ) -> Result<Artifact, ConceptflowError> {
        let stored = self.store.load(process, stage).await.map_err(|err| match err {
            StoreError::Corrupt {
                process,
                stage,
                reason,
            } => ConceptflowError::NotFound(NotFoundError::Unreadable {
                process,
                stage,
                reason,
            }),
            other => other.into(),
        })?;
        Ok(self.stages.get(stage).load(stored).await?)
    }

    /// Races stage work against cancellation and the stage timeout.
    ///
    /// A panic inside the work is reported as a stage failure.
    async fn guarded<T, F>(
        &self,
        inv: &Invocation,
        stage: PipelineStage,
        work: F,
    ) -> Result<T, ConceptflowError>
    where
        F: Future<Output = Result<T, StageExecutionError>> + Send,
    {
        let work = AssertUnwindSafe(work).catch_unwind().map(|result| match result {
            Ok(result) => result.map_err(ConceptflowError::from),
            Err(_) => Err(StageExecutionError::new(stage, "stage panicked").into()),
        });
        let bounded = async {
            match self.stage_timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => Err(ConceptflowError::StageTimeout {
                        process: inv.process.clone(),
                        stage,
                        timeout: limit,
                    }),
                },
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            () = inv.cancel.cancelled() => Err(ConceptflowError::Cancelled {
                process: inv.process.clone(),
                stage: Some(stage),
                reason: inv.cancel.reason().unwrap_or_default(),
            }),
            result = bounded => result,
        }
    }

    fn mark_started(&self, inv: &Invocation, stage: PipelineStage) -> Result<(), ConceptflowError> {
        self.registry
            .set_status(&inv.process, stage, StageStatus::Started)?;
        self.emit(PipelineEvent::StageStarted {
            process: inv.process.clone(),
            run_id: inv.run_id,
            stage,
        });
        Ok(())
    }

    fn fail(&self, inv: &Invocation, stage: PipelineStage, err: &ConceptflowError) {
        let message = err.to_string();
        warn!(
            process = %inv.process,
            stage = %stage,
            code = err.code(),
            error = %message,
            "Stage failed"
        );
        if let Err(e) = self.registry.record_error(&inv.process, stage, message.clone()) {
            warn!(process = %inv.process, error = %e, "Could not record stage failure");
        }
        self.emit(PipelineEvent::StageFailed {
            process: inv.process.clone(),
            run_id: inv.run_id,
            stage,
            error: message,
        });
    }

    fn emit(&self, event: PipelineEvent) {
        self.events.emit(&event);
    }
}
