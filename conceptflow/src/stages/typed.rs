//! Typed adapter for stage implementations.
//!
//! A [`TypedStage`] works with its own config and output types. Wrapping it
//! in [`Typed`] turns it into a [`StageContract`]: options are deserialized
//! into `Config` during validation, the output is serialized into the
//! artifact payload, and stored artifacts are checked against `Output` on
//! load.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{StageConfig, StageContext, StageContract, StageInput};
use crate::core::{Artifact, PipelineStage};
use crate::errors::{ConfigError, NotFoundError, StageExecutionError};

/// A stage implementation with typed configuration and output.
///
/// Use `#[serde(deny_unknown_fields)]` on `Config` to reject unknown options.
#[async_trait]
pub trait TypedStage: Send + Sync + 'static {
    /// The stage this implementation produces.
    const STAGE: PipelineStage;

    /// The stage's configuration type.
    type Config: DeserializeOwned + Send;

    /// The artifact payload type.
    type Output: Serialize + DeserializeOwned + Send;

    /// Produces the stage output.
    async fn produce(
        &self,
        ctx: &StageContext,
        config: Self::Config,
        input: StageInput,
    ) -> Result<Self::Output, StageExecutionError>;
}

/// Adapter exposing a [`TypedStage`] as a [`StageContract`].
#[derive(Debug, Clone, Default)]
pub struct Typed<S>(pub S);

impl<S: TypedStage> Typed<S> {
    /// Wraps a typed stage.
    #[must_use]
    pub fn new(stage: S) -> Self {
        Self(stage)
    }

    fn parse_config(config: &StageConfig) -> Result<S::Config, ConfigError> {
        serde_json::from_value(Value::Object(config.options.clone())).map_err(|e| {
            ConfigError::new(format!("invalid configuration for stage '{}': {e}", S::STAGE))
                .for_stage(S::STAGE)
        })
    }
}

#[async_trait]
impl<S: TypedStage> StageContract for Typed<S> {
    fn stage(&self) -> PipelineStage {
        S::STAGE
    }

    fn validate_config(&self, config: &StageConfig) -> Result<(), ConfigError> {
        Self::parse_config(config).map(|_| ())
    }

    async fn create(
        &self,
        ctx: &StageContext,
        input: StageInput,
    ) -> Result<Value, StageExecutionError> {
        let config = Self::parse_config(ctx.config())
            .map_err(|e| StageExecutionError::new(S::STAGE, e.message))?;
        let output = self.0.produce(ctx, config, input).await?;
        serde_json::to_value(output).map_err(|e| {
            StageExecutionError::new(S::STAGE, format!("failed to serialize output: {e}"))
        })
    }

    async fn load(&self, artifact: Artifact) -> Result<Artifact, NotFoundError> {
        if let Err(e) = artifact.decode::<S::Output>() {
            return Err(NotFoundError::Unreadable {
                process: artifact.process.clone(),
                stage: S::STAGE,
                reason: e.to_string(),
            });
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct EmbeddingOptions {
        #[serde(default = "default_dimensions")]
        dimensions: usize,
    }

    fn default_dimensions() -> usize {
        8
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Embeddings {
        phrases: usize,
        dimensions: usize,
    }

    struct CountingEmbedder;

    #[async_trait]
    impl TypedStage for CountingEmbedder {
        const STAGE: PipelineStage = PipelineStage::Embedding;
        type Config = EmbeddingOptions;
        type Output = Embeddings;

        async fn produce(
            &self,
            _ctx: &StageContext,
            config: EmbeddingOptions,
            input: StageInput,
        ) -> Result<Embeddings, StageExecutionError> {
            let phrases = input
                .upstream()
                .and_then(|a| a.payload.get("phrases"))
                .and_then(Value::as_u64)
                .ok_or_else(|| StageExecutionError::new(Self::STAGE, "no phrases upstream"))?;
            Ok(Embeddings {
                phrases: phrases as usize,
                dimensions: config.dimensions,
            })
        }
    }

    fn ctx(config: StageConfig) -> StageContext {
        StageContext::new(
            "p",
            PipelineStage::Embedding,
            Uuid::new_v4(),
            config,
            Arc::new(CancellationToken::new()),
        )
    }

    #[test]
    fn test_validate_config_uses_config_type() {
        let stage = Typed::new(CountingEmbedder);

        assert!(stage.validate_config(&StageConfig::new()).is_ok());
        assert!(stage
            .validate_config(&StageConfig::new().with_option("dimensions", json!(16)))
            .is_ok());

        let err = stage
            .validate_config(&StageConfig::new().with_option("dims", json!(16)))
            .unwrap_err();
        assert_eq!(err.stage, Some(PipelineStage::Embedding));

        let err = stage
            .validate_config(&StageConfig::new().with_option("dimensions", json!("many")))
            .unwrap_err();
        assert!(err.message.contains("embedding"));
    }

    #[tokio::test]
    async fn test_create_serializes_output() {
        let stage = Typed::new(CountingEmbedder);
        let upstream = Artifact::new("p", PipelineStage::Data, json!({"phrases": 42}));

        let payload = stage
            .create(
                &ctx(StageConfig::new().with_option("dimensions", json!(4))),
                StageInput::Upstream(upstream),
            )
            .await
            .unwrap();

        assert_eq!(payload, json!({"phrases": 42, "dimensions": 4}));
    }

    #[tokio::test]
    async fn test_create_propagates_domain_error() {
        let stage = Typed::new(CountingEmbedder);
        let upstream = Artifact::new("p", PipelineStage::Data, json!({}));

        let err = stage
            .create(&ctx(StageConfig::new()), StageInput::Upstream(upstream))
            .await
            .unwrap_err();
        assert_eq!(err.message, "no phrases upstream");
    }

    #[tokio::test]
    async fn test_load_rejects_foreign_payload() {
        let stage = Typed::new(CountingEmbedder);

        let good = Artifact::new("p", PipelineStage::Embedding, json!({"phrases": 1, "dimensions": 2}));
        assert!(stage.load(good).await.is_ok());

        let bad = Artifact::new("p", PipelineStage::Embedding, json!("not embeddings"));
        let err = stage.load(bad).await.unwrap_err();
        assert!(matches!(err, NotFoundError::Unreadable { stage: PipelineStage::Embedding, .. }));
    }
}
