//! Test fixtures: sample inputs, stage sets and an in-memory harness.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{CallLog, RecordingStage};
use crate::config::OrchestratorConfig;
use crate::core::PipelineStage;
use crate::events::CollectingEventSink;
use crate::orchestrator::Orchestrator;
use crate::stages::{Document, DocumentBundle, StageContract, StageSet};
use crate::store::{ArtifactStore, InMemoryArtifactStore};

/// Returns a small labeled corpus.
#[must_use]
pub fn sample_documents() -> DocumentBundle {
    let documents = vec![
        Document::new("doc-1", "Chronic heart failure with reduced ejection fraction."),
        Document::new("doc-2", "Acute renal failure after contrast exposure."),
        Document::new("doc-3", "Heart failure patients on beta blockers."),
    ];
    let labels = BTreeMap::from([
        ("doc-1".to_string(), "cardiology".to_string()),
        ("doc-2".to_string(), "nephrology".to_string()),
        ("doc-3".to_string(), "cardiology".to_string()),
    ]);
    DocumentBundle::new(documents).with_labels(labels)
}

/// Returns a set of recording stages sharing one call log.
#[must_use]
pub fn recording_stage_set() -> (StageSet, CallLog) {
    let log = CallLog::new();
    let set = recording_stage_set_with(&log, Vec::new());
    (set, log)
}

/// Returns recording stages logging to `log`, with the given
/// implementations replacing the recording stage of their stage.
///
/// # Panics
///
/// Panics if two replacements implement the same stage.
#[must_use]
pub fn recording_stage_set_with(
    log: &CallLog,
    replacements: Vec<Arc<dyn StageContract>>,
) -> StageSet {
    let mut builder = StageSet::builder();
    for stage in PipelineStage::ALL {
        if !replacements.iter().any(|r| r.stage() == stage) {
            builder = builder.with(RecordingStage::new(stage, log.clone()));
        }
    }
    for replacement in replacements {
        builder = builder.with_arc(replacement);
    }
    builder
        .build()
        .expect("replacements must implement distinct stages")
}

/// An orchestrator over an in-memory store with collected events.
pub struct TestHarness {
    /// The orchestrator under test.
    pub orchestrator: Orchestrator,
    /// The store behind the orchestrator.
    pub store: Arc<InMemoryArtifactStore>,
    /// Every event emitted so far.
    pub events: Arc<CollectingEventSink>,
    /// Calls made to the stage doubles.
    pub log: CallLog,
}

impl TestHarness {
    /// Creates a harness with recording stages and the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stages(CallLog::new(), Vec::new(), OrchestratorConfig::default())
    }

    /// Creates a harness with some stages replaced and a custom config.
    ///
    /// Replacements should log to the same `log` to make call order
    /// observable across stages.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn with_stages(
        log: CallLog,
        replacements: Vec<Arc<dyn StageContract>>,
        config: OrchestratorConfig,
    ) -> Self {
        let store = Arc::new(InMemoryArtifactStore::new());
        let stages = recording_stage_set_with(&log, replacements);
        let events = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::new(config, store.clone(), stages)
            .expect("test configuration must be valid")
            .with_event_sink(events.clone());
        Self {
            orchestrator,
            store,
            events,
            log,
        }
    }

    /// Returns the store as a trait object.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn ArtifactStore> {
        self.store.clone()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_documents_are_labeled() {
        let bundle = sample_documents();
        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.labels.as_ref().map(BTreeMap::len), Some(3));
    }

    #[test]
    fn test_recording_stage_set_with_replacement() {
        let log = CallLog::new();
        let failing: Arc<dyn StageContract> = Arc::new(crate::testing::FailingStage::new(
            PipelineStage::Embedding,
            "boom",
            log.clone(),
        ));
        let set = recording_stage_set_with(&log, vec![failing]);
        assert_eq!(set.get(PipelineStage::Embedding).stage(), PipelineStage::Embedding);
    }
}
