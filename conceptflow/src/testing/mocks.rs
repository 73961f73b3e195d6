//! Stage doubles for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Artifact, PipelineStage};
use crate::errors::{NotFoundError, StageExecutionError};
use crate::stages::{StageContext, StageContract, StageInput};

/// Shared log of `create` calls across stage doubles.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<PipelineStage>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call.
    pub fn record(&self, stage: PipelineStage) {
        self.calls.lock().push(stage);
    }

    /// Returns all calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PipelineStage> {
        self.calls.lock().clone()
    }

    /// Returns how often a stage was called.
    #[must_use]
    pub fn count(&self, stage: PipelineStage) -> usize {
        self.calls.lock().iter().filter(|s| **s == stage).count()
    }

    /// Returns the total number of calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns true if nothing was called.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

fn summarize(input: &StageInput) -> Value {
    match input {
        StageInput::Documents(bundle) => json!({
            "documents": bundle.len(),
            "labeled": bundle.labels.is_some(),
        }),
        StageInput::Upstream(artifact) => json!({ "upstream": artifact.stage }),
    }
}

/// A stage that records its calls and produces a small descriptive payload.
///
/// Its `load` accepts only payloads it could have produced itself.
#[derive(Debug, Clone)]
pub struct RecordingStage {
    stage: PipelineStage,
    log: CallLog,
    options: Option<&'static [&'static str]>,
}

impl RecordingStage {
    /// Creates a recording stage.
    #[must_use]
    pub fn new(stage: PipelineStage, log: CallLog) -> Self {
        Self {
            stage,
            log,
            options: None,
        }
    }

    /// Restricts the options the stage accepts.
    #[must_use]
    pub fn with_options(mut self, options: &'static [&'static str]) -> Self {
        self.options = Some(options);
        self
    }
}

#[async_trait]
impl StageContract for RecordingStage {
    fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn recognized_options(&self) -> Option<&[&'static str]> {
        self.options
    }

    async fn create(
        &self,
        ctx: &StageContext,
        input: StageInput,
    ) -> Result<Value, StageExecutionError> {
        self.log.record(self.stage);
        Ok(json!({
            "stage": self.stage,
            "process": ctx.process(),
            "language": ctx.language(),
            "input": summarize(&input),
            "options": ctx.config().options,
        }))
    }

    async fn load(&self, artifact: Artifact) -> Result<Artifact, NotFoundError> {
        if artifact.payload.get("stage") != Some(&json!(self.stage)) {
            return Err(NotFoundError::Unreadable {
                process: artifact.process.clone(),
                stage: self.stage,
                reason: "payload was not produced by this stage".to_string(),
            });
        }
        Ok(artifact)
    }
}

/// A stage whose `create` always fails.
#[derive(Debug, Clone)]
pub struct FailingStage {
    stage: PipelineStage,
    message: String,
    log: CallLog,
}

impl FailingStage {
    /// Creates a failing stage that records its calls in `log`.
    #[must_use]
    pub fn new(stage: PipelineStage, message: impl Into<String>, log: CallLog) -> Self {
        Self {
            stage,
            message: message.into(),
            log,
        }
    }
}

#[async_trait]
impl StageContract for FailingStage {
    fn stage(&self) -> PipelineStage {
        self.stage
    }

    async fn create(
        &self,
        _ctx: &StageContext,
        _input: StageInput,
    ) -> Result<Value, StageExecutionError> {
        self.log.record(self.stage);
        Err(StageExecutionError::new(self.stage, self.message.clone()))
    }
}

/// A recording stage that takes a while before producing its payload.
#[derive(Debug, Clone)]
pub struct SlowStage {
    inner: RecordingStage,
    delay: Duration,
}

impl SlowStage {
    /// Creates a slow stage.
    #[must_use]
    pub fn new(stage: PipelineStage, delay: Duration, log: CallLog) -> Self {
        Self {
            inner: RecordingStage::new(stage, log),
            delay,
        }
    }

    /// Creates a slow stage with the delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(stage: PipelineStage, ms: u64, log: CallLog) -> Self {
        Self::new(stage, Duration::from_millis(ms), log)
    }
}

#[async_trait]
impl StageContract for SlowStage {
    fn stage(&self) -> PipelineStage {
        self.inner.stage
    }

    async fn create(
        &self,
        ctx: &StageContext,
        input: StageInput,
    ) -> Result<Value, StageExecutionError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(ctx, input).await
    }

    async fn load(&self, artifact: Artifact) -> Result<Artifact, NotFoundError> {
        self.inner.load(artifact).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::stages::{Document, DocumentBundle, StageConfig};
    use uuid::Uuid;

    fn ctx(stage: PipelineStage) -> StageContext {
        StageContext::new(
            "p",
            stage,
            Uuid::new_v4(),
            StageConfig::new(),
            Arc::new(CancellationToken::new()),
        )
    }

    #[tokio::test]
    async fn test_recording_stage_records_and_describes_input() {
        let log = CallLog::new();
        let stage = RecordingStage::new(PipelineStage::Data, log.clone());
        let bundle = DocumentBundle::new(vec![Document::new("d1", "text")]);

        let payload = stage
            .create(&ctx(PipelineStage::Data), StageInput::Documents(Arc::new(bundle)))
            .await
            .unwrap();

        assert_eq!(log.calls(), vec![PipelineStage::Data]);
        assert_eq!(payload["stage"], "data");
        assert_eq!(payload["input"]["documents"], 1);
    }

    #[tokio::test]
    async fn test_recording_stage_load_checks_origin() {
        let stage = RecordingStage::new(PipelineStage::Embedding, CallLog::new());

        let own = Artifact::new("p", PipelineStage::Embedding, json!({"stage": "embedding"}));
        assert!(stage.load(own).await.is_ok());

        let foreign = Artifact::new("p", PipelineStage::Embedding, json!({"stage": "data"}));
        assert!(stage.load(foreign).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let log = CallLog::new();
        let stage = FailingStage::new(PipelineStage::Graph, "boom", log.clone());
        let upstream = Artifact::new("p", PipelineStage::Clustering, json!({}));

        let err = stage
            .create(&ctx(PipelineStage::Graph), StageInput::Upstream(upstream))
            .await
            .unwrap_err();

        assert_eq!(err.message, "boom");
        assert_eq!(log.count(PipelineStage::Graph), 1);
    }
}
