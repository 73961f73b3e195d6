//! Typed pipeline events.

use serde::Serialize;
use uuid::Uuid;

use crate::core::PipelineStage;

/// An observable step in the life of a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// The coordinator acquired a worker slot and began executing.
    #[serde(rename = "pipeline.started")]
    PipelineStarted {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
    },
    /// Every targeted stage finished.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// Wall time of the invocation in milliseconds.
        duration_ms: f64,
    },
    /// The pipeline halted on a failure.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The failing stage, if the failure is attributed to one.
        stage: Option<PipelineStage>,
        /// The error message.
        error: String,
    },
    /// The pipeline was cancelled.
    #[serde(rename = "pipeline.cancelled")]
    PipelineCancelled {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The cancellation reason.
        reason: String,
    },
    /// A stage was marked `Started`.
    #[serde(rename = "stage.started")]
    StageStarted {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The stage.
        stage: PipelineStage,
    },
    /// A stage was satisfied from its existing artifact.
    #[serde(rename = "stage.skipped")]
    StageSkipped {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The stage.
        stage: PipelineStage,
    },
    /// An omitted stage had no artifact and was left untouched.
    #[serde(rename = "stage.omitted")]
    StageOmitted {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The stage.
        stage: PipelineStage,
    },
    /// An existing artifact was deleted so the stage can be regenerated.
    #[serde(rename = "stage.overwrite")]
    StageOverwrite {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The stage.
        stage: PipelineStage,
    },
    /// A stage produced and persisted a fresh artifact.
    #[serde(rename = "stage.finished")]
    StageFinished {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The stage.
        stage: PipelineStage,
        /// Time spent in `create` plus persistence, in milliseconds.
        duration_ms: f64,
    },
    /// A stage failed and was marked `Error`.
    #[serde(rename = "stage.failed")]
    StageFailed {
        /// The process name.
        process: String,
        /// The invocation id.
        run_id: Uuid,
        /// The stage.
        stage: PipelineStage,
        /// The error message.
        error: String,
    },
}

impl PipelineEvent {
    /// Returns the dotted event type, e.g. `stage.skipped`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PipelineStarted { .. } => "pipeline.started",
            Self::PipelineCompleted { .. } => "pipeline.completed",
            Self::PipelineFailed { .. } => "pipeline.failed",
            Self::PipelineCancelled { .. } => "pipeline.cancelled",
            Self::StageStarted { .. } => "stage.started",
            Self::StageSkipped { .. } => "stage.skipped",
            Self::StageOmitted { .. } => "stage.omitted",
            Self::StageOverwrite { .. } => "stage.overwrite",
            Self::StageFinished { .. } => "stage.finished",
            Self::StageFailed { .. } => "stage.failed",
        }
    }

    /// Returns the process the event belongs to.
    #[must_use]
    pub fn process(&self) -> &str {
        match self {
            Self::PipelineStarted { process, .. }
            | Self::PipelineCompleted { process, .. }
            | Self::PipelineFailed { process, .. }
            | Self::PipelineCancelled { process, .. }
            | Self::StageStarted { process, .. }
            | Self::StageSkipped { process, .. }
            | Self::StageOmitted { process, .. }
            | Self::StageOverwrite { process, .. }
            | Self::StageFinished { process, .. }
            | Self::StageFailed { process, .. } => process,
        }
    }

    /// Returns the stage the event refers to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::StageStarted { stage, .. }
            | Self::StageSkipped { stage, .. }
            | Self::StageOmitted { stage, .. }
            | Self::StageOverwrite { stage, .. }
            | Self::StageFinished { stage, .. }
            | Self::StageFailed { stage, .. } => Some(*stage),
            Self::PipelineFailed { stage, .. } => *stage,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PipelineEvent::StageSkipped {
            process: "corpus1".to_string(),
            run_id: Uuid::nil(),
            stage: PipelineStage::Data,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "stage.skipped");
        assert_eq!(json["stage"], "data");
        assert_eq!(event.event_type(), "stage.skipped");
    }

    #[test]
    fn test_event_accessors() {
        let event = PipelineEvent::PipelineFailed {
            process: "p".to_string(),
            run_id: Uuid::nil(),
            stage: Some(PipelineStage::Embedding),
            error: "boom".to_string(),
        };
        assert_eq!(event.process(), "p");
        assert_eq!(event.stage(), Some(PipelineStage::Embedding));
    }
}
