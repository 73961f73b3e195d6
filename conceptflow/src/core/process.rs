//! Read-only views of a process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{PipelineStage, StageStatus};

/// A point-in-time view of one process as held by the registry.
///
/// Stages that were never touched are absent from `stages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessView {
    /// The process name.
    pub name: String,
    /// Optional human-readable name for the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// When the process was first registered (ISO 8601).
    pub created_at: String,
    /// When the process was last updated (ISO 8601).
    pub updated_at: String,
    /// Id of the most recent invocation, if any ran in this orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// Whether an invocation is currently in flight.
    pub running: bool,
    /// Per-stage status.
    pub stages: BTreeMap<PipelineStage, StageStatus>,
    /// Failure messages of stages with status `Error`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<PipelineStage, String>,
}

impl ProcessView {
    /// Returns the status of a stage, if it was touched.
    #[must_use]
    pub fn status(&self, stage: PipelineStage) -> Option<StageStatus> {
        self.stages.get(&stage).copied()
    }

    /// Returns true if every stage is `Finished`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        PipelineStage::ALL
            .iter()
            .all(|stage| self.status(*stage) == Some(StageStatus::Finished))
    }

    /// Returns the first stage in pipeline order with status `Error`.
    #[must_use]
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        self.stages
            .iter()
            .find(|(_, status)| status.is_failure())
            .map(|(stage, _)| *stage)
    }
}

/// A process as found in the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProcess {
    /// The process name.
    pub name: String,
    /// Stages with a stored artifact, in pipeline order.
    pub stages: Vec<PipelineStage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(stages: &[(PipelineStage, StageStatus)]) -> ProcessView {
        ProcessView {
            name: "p".to_string(),
            display_name: None,
            created_at: String::new(),
            updated_at: String::new(),
            run_id: None,
            running: false,
            stages: stages.iter().copied().collect(),
            errors: BTreeMap::new(),
        }
    }

    #[test]
    fn test_complete_requires_all_stages() {
        let partial = view(&[
            (PipelineStage::Data, StageStatus::Finished),
            (PipelineStage::Embedding, StageStatus::Finished),
        ]);
        assert!(!partial.is_complete());

        let full = view(
            &PipelineStage::ALL.map(|s| (s, StageStatus::Finished)),
        );
        assert!(full.is_complete());
    }

    #[test]
    fn test_failed_stage() {
        let v = view(&[
            (PipelineStage::Data, StageStatus::Finished),
            (PipelineStage::Embedding, StageStatus::Error),
        ]);
        assert_eq!(v.failed_stage(), Some(PipelineStage::Embedding));
        assert_eq!(v.status(PipelineStage::Graph), None);
    }

    #[test]
    fn test_view_serializes_stage_keys() {
        let v = view(&[(PipelineStage::Data, StageStatus::Started)]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["stages"]["data"], "started");
        assert!(json.get("errors").is_none());
    }
}
