//! Execution context handed to a stage.

use std::sync::Arc;
use uuid::Uuid;

use super::{Language, StageConfig};
use crate::cancellation::CancellationToken;
use crate::core::PipelineStage;

/// What a stage knows about the invocation it runs in.
#[derive(Debug, Clone)]
pub struct StageContext {
    process: String,
    stage: PipelineStage,
    run_id: Uuid,
    config: StageConfig,
    cancel: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        process: impl Into<String>,
        stage: PipelineStage,
        run_id: Uuid,
        config: StageConfig,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            process: process.into(),
            stage,
            run_id,
            config,
            cancel,
        }
    }

    /// Returns the process name.
    #[must_use]
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Returns the stage being executed.
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Returns the invocation id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the stage configuration.
    #[must_use]
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Returns the language preset.
    #[must_use]
    pub fn language(&self) -> Language {
        self.config.language()
    }

    /// Returns true if the invocation was cancelled.
    ///
    /// Long-running stages may poll this to stop early.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the invocation's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }
}
