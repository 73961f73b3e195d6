//! Decides what happens to a stage given its artifact state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::PipelineStage;

/// What the runner does with a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDecision {
    /// The artifact exists and is reused.
    Skip,
    /// The artifact exists and is deleted before regenerating it.
    Overwrite,
    /// No artifact exists; the stage is executed.
    Run,
    /// The stage is omitted and has no artifact; nothing happens.
    Omit,
}

/// Skip/overwrite policy of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    /// Reuse any existing artifact.
    #[serde(default = "default_skip_present")]
    pub skip_present: bool,

    /// Stages never executed in this invocation.
    #[serde(default)]
    pub omitted: BTreeSet<PipelineStage>,

    /// Regenerate present artifacts downstream of a stage that was
    /// regenerated in the same invocation.
    #[serde(default)]
    pub invalidate_downstream: bool,
}

fn default_skip_present() -> bool {
    true
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            skip_present: default_skip_present(),
            omitted: BTreeSet::new(),
            invalidate_downstream: false,
        }
    }
}

impl SkipPolicy {
    /// Creates the default policy: skip present artifacts, omit nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether present artifacts are reused.
    #[must_use]
    pub fn with_skip_present(mut self, skip_present: bool) -> Self {
        self.skip_present = skip_present;
        self
    }

    /// Omits a stage.
    #[must_use]
    pub fn omit(mut self, stage: PipelineStage) -> Self {
        self.omitted.insert(stage);
        self
    }

    /// Sets whether regenerated stages invalidate downstream artifacts.
    #[must_use]
    pub fn with_invalidate_downstream(mut self, invalidate: bool) -> Self {
        self.invalidate_downstream = invalidate;
        self
    }

    /// Returns true if the stage is omitted.
    #[must_use]
    pub fn is_omitted(&self, stage: PipelineStage) -> bool {
        self.omitted.contains(&stage)
    }

    /// Decides what to do with a stage.
    ///
    /// `upstream_regenerated` is true when the stage right before this one
    /// produced a fresh artifact in the current invocation.
    #[must_use]
    pub fn decide(
        &self,
        stage: PipelineStage,
        artifact_exists: bool,
        upstream_regenerated: bool,
    ) -> StageDecision {
        let omitted = self.is_omitted(stage);
        if !artifact_exists {
            return if omitted {
                StageDecision::Omit
            } else {
                StageDecision::Run
            };
        }
        let stale = self.invalidate_downstream && upstream_regenerated;
        if omitted || (self.skip_present && !stale) {
            StageDecision::Skip
        } else {
            StageDecision::Overwrite
        }
    }
}
