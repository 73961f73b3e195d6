//! The stage contract and its supporting types.
//!
//! The orchestrator knows nothing about what a stage computes. Each of the
//! four stages is plugged in as a [`StageContract`] implementation and
//! collected into a [`StageSet`].

mod config;
mod context;
mod input;
mod set;
mod typed;

pub use config::{Language, StageConfig};
pub use context::StageContext;
pub use input::{
    Document, DocumentBundle, DocumentSource, InputSource, StageInput, StaticDocumentSource,
};
pub use set::{StageSet, StageSetBuilder};
pub use typed::{Typed, TypedStage};

use async_trait::async_trait;

use crate::core::{Artifact, PipelineStage};
use crate::errors::{ConfigError, NotFoundError, StageExecutionError};

/// Trait implemented by the domain logic of one pipeline stage.
#[async_trait]
pub trait StageContract: Send + Sync {
    /// Returns the stage this contract implements.
    fn stage(&self) -> PipelineStage;

    /// Returns the option keys this stage accepts.
    ///
    /// `None` accepts any key and leaves checking to `validate_config`.
    fn recognized_options(&self) -> Option<&[&'static str]> {
        None
    }

    /// Validates a configuration before any stage of the invocation runs.
    fn validate_config(&self, config: &StageConfig) -> Result<(), ConfigError> {
        if let Some(known) = self.recognized_options() {
            if let Some(key) = config.options.keys().find(|k| !known.contains(&k.as_str())) {
                return Err(ConfigError::unrecognized_option(self.stage(), key.clone()));
            }
        }
        Ok(())
    }

    /// Produces the stage's artifact payload.
    ///
    /// `Data` receives [`StageInput::Documents`], every later stage the
    /// loaded upstream artifact.
    async fn create(
        &self,
        ctx: &StageContext,
        input: StageInput,
    ) -> Result<serde_json::Value, StageExecutionError>;

    /// Reconstructs a usable view of a stored artifact.
    ///
    /// Fails with `NotFoundError::Unreadable` if the payload is not a valid
    /// artifact of this stage.
    async fn load(&self, artifact: Artifact) -> Result<Artifact, NotFoundError> {
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Strict;

    #[async_trait]
    impl StageContract for Strict {
        fn stage(&self) -> PipelineStage {
            PipelineStage::Clustering
        }

        fn recognized_options(&self) -> Option<&[&'static str]> {
            Some(&["algorithm", "clusters"])
        }

        async fn create(
            &self,
            _ctx: &StageContext,
            _input: StageInput,
        ) -> Result<serde_json::Value, StageExecutionError> {
            Ok(json!({}))
        }
    }

    #[test]
    fn test_validate_config_accepts_known_options() {
        let config = StageConfig::new().with_option("algorithm", json!("kmeans"));
        assert!(Strict.validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_rejects_unknown_option() {
        let config = StageConfig::new()
            .with_option("clusters", json!(4))
            .with_option("n_neighbours", json!(5));

        let err = Strict.validate_config(&config).unwrap_err();
        assert_eq!(err.stage, Some(PipelineStage::Clustering));
        assert_eq!(err.option.as_deref(), Some("n_neighbours"));
    }

    #[tokio::test]
    async fn test_default_load_is_identity() {
        let artifact = Artifact::new("p", PipelineStage::Clustering, json!({"k": 3}));
        let loaded = Strict.load(artifact.clone()).await.unwrap();
        assert_eq!(loaded, artifact);
    }
}
