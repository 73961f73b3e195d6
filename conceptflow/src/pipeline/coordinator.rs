//! Drives the four stages of an invocation in order on a background task.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{
    Invocation, PipelineHandle, PipelineReport, PipelineRequest, ReportedError, StageOutcome,
    StageReport, StageRunner,
};
use crate::cancellation::CancellationToken;
use crate::core::{Artifact, PipelineStage};
use crate::errors::{ConceptflowError, ConfigError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::registry::ProcessRegistry;
use crate::utils::validate_process_name;

/// Default number of pipelines allowed to execute at the same time.
pub const DEFAULT_MAX_CONCURRENT_PIPELINES: usize = 4;

/// Starts and drives pipeline invocations.
#[derive(Clone)]
pub struct PipelineCoordinator {
    runner: StageRunner,
    registry: Arc<ProcessRegistry>,
    events: Arc<dyn EventSink>,
    permits: Arc<Semaphore>,
}

impl PipelineCoordinator {
    /// Creates a new coordinator.
    #[must_use]
    pub fn new(runner: StageRunner, registry: Arc<ProcessRegistry>) -> Self {
        Self {
            runner,
            registry,
            events: Arc::new(NoOpEventSink),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_PIPELINES)),
        }
    }

    /// Sets how many pipelines may execute at the same time.
    ///
    /// Further invocations are accepted and wait for a free slot.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Sets the event sink of the coordinator and its runner.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.runner = self.runner.with_event_sink(Arc::clone(&events));
        self.events = events;
        self
    }

    /// Returns the stage runner.
    #[must_use]
    pub fn runner(&self) -> &StageRunner {
        &self.runner
    }

    /// Validates a request without starting it.
    pub fn validate(&self, process: &str, request: &PipelineRequest) -> Result<(), ConfigError> {
        validate_process_name(process)?;
        self.runner.stages().validate_configs(&request.configs)?;
        if matches!(&request.targets, Some(targets) if targets.is_empty()) {
            return Err(ConfigError::new("the request targets no stage"));
        }
        if request.always_runs_data() && request.input.is_none() {
            return Err(ConfigError::new(
                "input documents are required because the data stage will run",
            )
            .for_stage(PipelineStage::Data));
        }
        Ok(())
    }

    /// Validates the request, registers the process and starts the
    /// pipeline on a background task.
    ///
    /// Must be called from within a tokio runtime. Fails with `Config` if
    /// the request is invalid and with `ProcessBusy` if the process already
    /// has an invocation in flight. Nothing is touched in either case.
    pub fn start(
        &self,
        process: &str,
        request: PipelineRequest,
    ) -> Result<PipelineHandle, ConceptflowError> {
        self.validate(process, &request)?;

        let run_id = Uuid::now_v7();
        let guard = self.registry.begin_run(process, run_id)?;
        if request.display_name.is_some() {
            self.registry
                .set_display_name(process, request.display_name.clone())?;
        }

        let cancel = Arc::new(CancellationToken::new());
        let stages = request.stages();
        let invocation = Invocation {
            process: process.to_string(),
            run_id,
            policy: request.policy,
            configs: request.configs,
            input: request.input,
            cancel: Arc::clone(&cancel),
        };

        info!(
            process,
            %run_id,
            stages = ?stages,
            "Pipeline accepted"
        );

        let coordinator = self.clone();
        let span = info_span!("pipeline", process = %process, run_id = %run_id);
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                coordinator.execute(invocation, stages).await
            }
            .instrument(span),
        );

        Ok(PipelineHandle::new(process.to_string(), run_id, cancel, task))
    }

    async fn execute(&self, inv: Invocation, stages: Vec<PipelineStage>) -> PipelineReport {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(stages.len());
        let mut failure: Option<ConceptflowError> = None;

        // A queued invocation stops waiting for a slot as soon as it is cancelled.
        let _permit = tokio::select! {
            biased;
            () = inv.cancel.cancelled() => {
                failure = Some(Self::cancelled(&inv));
                None
            }
            acquired = Arc::clone(&self.permits).acquire_owned() => match acquired {
                Ok(permit) => Some(permit),
                Err(e) => {
                    failure = Some(ConceptflowError::Internal(format!(
                        "worker pool is closed: {e}"
                    )));
                    None
                }
            },
        };

        if failure.is_none() {
            info!("Pipeline started");
            self.events.emit(&PipelineEvent::PipelineStarted {
                process: inv.process.clone(),
                run_id: inv.run_id,
            });

            let mut in_hand: Option<Artifact> = None;
            for stage in stages {
                if inv.cancel.is_cancelled() {
                    failure = Some(Self::cancelled(&inv));
                    break;
                }

                let upstream = in_hand.take().filter(|a| Some(a.stage) == stage.upstream());
                match self.runner.run(&inv, stage, upstream).await {
                    Ok(outcome) => {
                        let decision = outcome.decision();
                        let duration_ms = match outcome {
                            StageOutcome::Produced {
                                artifact,
                                duration_ms,
                                ..
                            } => {
                                in_hand = Some(artifact);
                                Some(duration_ms)
                            }
                            StageOutcome::Skipped | StageOutcome::Omitted => None,
                        };
                        reports.push(StageReport {
                            stage,
                            decision,
                            duration_ms,
                        });
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.finish(&inv, failure.as_ref(), duration_ms);

        PipelineReport {
            process: inv.process,
            run_id: inv.run_id,
            stages: reports,
            error: failure.as_ref().map(ReportedError::from),
            duration_ms,
        }
    }

    fn cancelled(inv: &Invocation) -> ConceptflowError {
        ConceptflowError::Cancelled {
            process: inv.process.clone(),
            stage: None,
            reason: inv.cancel.reason().unwrap_or_default(),
        }
    }

    fn finish(&self, inv: &Invocation, failure: Option<&ConceptflowError>, duration_ms: f64) {
        let process = inv.process.clone();
        let run_id = inv.run_id;
        let event = match failure {
            None => {
                info!(duration_ms, "Pipeline completed");
                PipelineEvent::PipelineCompleted {
                    process,
                    run_id,
                    duration_ms,
                }
            }
            Some(ConceptflowError::Cancelled { reason, .. }) => {
                warn!(reason = %reason, "Pipeline cancelled");
                PipelineEvent::PipelineCancelled {
                    process,
                    run_id,
                    reason: reason.clone(),
                }
            }
            Some(err) => {
                error!(code = err.code(), stage = ?err.stage(), error = %err, "Pipeline failed");
                PipelineEvent::PipelineFailed {
                    process,
                    run_id,
                    stage: err.stage(),
                    error: err.to_string(),
                }
            }
        };
        self.events.emit(&event);
    }
}

impl std::fmt::Debug for PipelineCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}
