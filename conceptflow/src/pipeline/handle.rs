//! Handles to background pipeline invocations and their reports.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::StageDecision;
use crate::cancellation::CancellationToken;
use crate::core::PipelineStage;
use crate::errors::ConceptflowError;

/// What happened to one stage in an invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// The stage.
    pub stage: PipelineStage,
    /// The runner's decision.
    pub decision: StageDecision,
    /// Time spent producing the artifact, if one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

/// The error that ended an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    /// Stable error code.
    pub code: &'static str,
    /// The stage the error is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    /// The error message.
    pub message: String,
}

impl From<&ConceptflowError> for ReportedError {
    fn from(err: &ConceptflowError) -> Self {
        Self {
            code: err.code(),
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

/// The terminal result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// The process name.
    pub process: String,
    /// The invocation id.
    pub run_id: Uuid,
    /// Stages that were reached, in pipeline order.
    pub stages: Vec<StageReport>,
    /// The error that halted the pipeline, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
    /// Wall time of the invocation in milliseconds.
    pub duration_ms: f64,
}

impl PipelineReport {
    /// Returns true if every targeted stage ended without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns true if the invocation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.code == "CANCELLED")
    }

    /// Returns the stage that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        self.error.as_ref().and_then(|e| e.stage)
    }

    /// Returns the decision taken for a stage, if it was reached.
    #[must_use]
    pub fn decision(&self, stage: PipelineStage) -> Option<StageDecision> {
        self.stages
            .iter()
            .find(|report| report.stage == stage)
            .map(|report| report.decision)
    }

    /// Returns the stages that produced a fresh artifact.
    #[must_use]
    pub fn produced(&self) -> Vec<PipelineStage> {
        self.stages
            .iter()
            .filter(|r| matches!(r.decision, StageDecision::Run | StageDecision::Overwrite))
            .map(|r| r.stage)
            .collect()
    }
}

/// Handle to a pipeline running in the background.
#[derive(Debug)]
pub struct PipelineHandle {
    process: String,
    run_id: Uuid,
    cancel: Arc<CancellationToken>,
    task: JoinHandle<PipelineReport>,
}

impl PipelineHandle {
    pub(crate) fn new(
        process: String,
        run_id: Uuid,
        cancel: Arc<CancellationToken>,
        task: JoinHandle<PipelineReport>,
    ) -> Self {
        Self {
            process,
            run_id,
            cancel,
            task,
        }
    }

    /// Returns the process name.
    #[must_use]
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Returns the invocation id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Requests cancellation. Returns false if already cancelled.
    ///
    /// The pipeline stops before the next stage, or interrupts the running
    /// one and marks it `Error`.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.cancel.cancel(reason)
    }

    /// Returns true if the background task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the terminal state and returns the report.
    pub async fn join(self) -> Result<PipelineReport, ConceptflowError> {
        self.task.await.map_err(|e| {
            ConceptflowError::Internal(format!(
                "pipeline task for process '{}' failed: {e}",
                self.process
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(error: Option<ReportedError>) -> PipelineReport {
        PipelineReport {
            process: "p".to_string(),
            run_id: Uuid::nil(),
            stages: vec![
                StageReport {
                    stage: PipelineStage::Data,
                    decision: StageDecision::Skip,
                    duration_ms: None,
                },
                StageReport {
                    stage: PipelineStage::Embedding,
                    decision: StageDecision::Overwrite,
                    duration_ms: Some(3.5),
                },
            ],
            error,
            duration_ms: 4.0,
        }
    }

    #[test]
    fn test_report_success() {
        let r = report(None);
        assert!(r.is_success());
        assert!(!r.is_cancelled());
        assert_eq!(r.produced(), vec![PipelineStage::Embedding]);
        assert_eq!(r.decision(PipelineStage::Data), Some(StageDecision::Skip));
        assert_eq!(r.decision(PipelineStage::Graph), None);
    }

    #[test]
    fn test_report_from_error() {
        let err = ConceptflowError::MissingDependency {
            process: "p".to_string(),
            stage: PipelineStage::Graph,
            upstream: PipelineStage::Clustering,
        };
        let r = report(Some(ReportedError::from(&err)));

        assert!(!r.is_success());
        assert_eq!(r.failed_stage(), Some(PipelineStage::Graph));

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["error"]["code"], "MISSING_DEPENDENCY");
        assert_eq!(json["stages"][0]["decision"], "skip");
    }

    #[tokio::test]
    async fn test_handle_join_and_cancel() {
        let cancel = Arc::new(CancellationToken::new());
        let task = tokio::spawn(async { report(None) });
        let handle = PipelineHandle::new("p".to_string(), Uuid::nil(), Arc::clone(&cancel), task);

        assert!(handle.cancel("stop"));
        assert!(!handle.cancel("again"));
        assert!(cancel.is_cancelled());

        let joined = handle.join().await.unwrap();
        assert_eq!(joined.process, "p");
    }
}
