//! Assertions on process views.

use crate::core::{PipelineStage, ProcessView, StageStatus};

/// Asserts that a stage has the expected status.
pub fn assert_stage_status(view: &ProcessView, stage: PipelineStage, expected: StageStatus) {
    assert_eq!(
        view.status(stage),
        Some(expected),
        "Expected stage '{}' of process '{}' to be {}, got {:?}",
        stage,
        view.name,
        expected,
        view.status(stage)
    );
}

/// Asserts that every stage is `Finished`.
pub fn assert_all_finished(view: &ProcessView) {
    assert!(
        view.is_complete(),
        "Expected every stage of process '{}' to be finished, got {:?}",
        view.name,
        view.stages
    );
}

/// Asserts that a stage was never touched.
pub fn assert_stage_untouched(view: &ProcessView, stage: PipelineStage) {
    assert!(
        view.status(stage).is_none(),
        "Expected stage '{}' of process '{}' to be untouched, got {:?}",
        stage,
        view.name,
        view.status(stage)
    );
}

/// Asserts that a stage is `Error` with a message containing `needle`.
pub fn assert_stage_error(view: &ProcessView, stage: PipelineStage, needle: &str) {
    assert_stage_status(view, stage, StageStatus::Error);
    let message = view.errors.get(&stage).map(String::as_str).unwrap_or_default();
    assert!(
        message.contains(needle),
        "Expected error of stage '{}' to contain '{}', got '{}'",
        stage,
        needle,
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn view() -> ProcessView {
        ProcessView {
            name: "p".to_string(),
            display_name: None,
            created_at: String::new(),
            updated_at: String::new(),
            run_id: None,
            running: false,
            stages: BTreeMap::from([
                (PipelineStage::Data, StageStatus::Finished),
                (PipelineStage::Embedding, StageStatus::Error),
            ]),
            errors: BTreeMap::from([(PipelineStage::Embedding, "model missing".to_string())]),
        }
    }

    #[test]
    fn test_passing_assertions() {
        let v = view();
        assert_stage_status(&v, PipelineStage::Data, StageStatus::Finished);
        assert_stage_error(&v, PipelineStage::Embedding, "model");
        assert_stage_untouched(&v, PipelineStage::Graph);
    }

    #[test]
    #[should_panic(expected = "to be finished")]
    fn test_assert_all_finished_panics() {
        assert_all_finished(&view());
    }
}
