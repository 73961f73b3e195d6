//! Mapping from stage to stage implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{StageConfig, StageContract};
use crate::core::PipelineStage;
use crate::errors::ConfigError;

/// One implementation for each of the four stages.
#[derive(Clone)]
pub struct StageSet {
    contracts: [Arc<dyn StageContract>; 4],
}

impl StageSet {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> StageSetBuilder {
        StageSetBuilder::default()
    }

    /// Returns the implementation of a stage.
    #[must_use]
    pub fn get(&self, stage: PipelineStage) -> &Arc<dyn StageContract> {
        &self.contracts[usize::from(stage.ordinal() - 1)]
    }

    /// Validates the configurations of an invocation.
    ///
    /// Stages without an entry are validated against an empty config.
    pub fn validate_configs(
        &self,
        configs: &BTreeMap<PipelineStage, StageConfig>,
    ) -> Result<(), ConfigError> {
        let empty = StageConfig::default();
        for stage in PipelineStage::ALL {
            let config = configs.get(&stage).unwrap_or(&empty);
            self.get(stage).validate_config(config)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSet")
            .field("stages", &PipelineStage::ALL)
            .finish()
    }
}

/// Builder for [`StageSet`].
#[derive(Default)]
pub struct StageSetBuilder {
    contracts: BTreeMap<PipelineStage, Arc<dyn StageContract>>,
    duplicate: Option<PipelineStage>,
}

impl StageSetBuilder {
    /// Adds a stage implementation.
    #[must_use]
    pub fn with(self, contract: impl StageContract + 'static) -> Self {
        self.with_arc(Arc::new(contract))
    }

    /// Adds a shared stage implementation.
    #[must_use]
    pub fn with_arc(mut self, contract: Arc<dyn StageContract>) -> Self {
        let stage = contract.stage();
        if self.contracts.insert(stage, contract).is_some() {
            self.duplicate.get_or_insert(stage);
        }
        self
    }

    /// Builds the set.
    ///
    /// Fails if a stage has no implementation or more than one.
    pub fn build(mut self) -> Result<StageSet, ConfigError> {
        if let Some(stage) = self.duplicate {
            return Err(ConfigError::new(format!(
                "more than one implementation registered for stage '{stage}'"
            ))
            .for_stage(stage));
        }
        let mut take = |stage: PipelineStage| {
            self.contracts.remove(&stage).ok_or_else(|| {
                ConfigError::new(format!("no implementation registered for stage '{stage}'"))
                    .for_stage(stage)
            })
        };
        Ok(StageSet {
            contracts: [
                take(PipelineStage::Data)?,
                take(PipelineStage::Embedding)?,
                take(PipelineStage::Clustering)?,
                take(PipelineStage::Graph)?,
            ],
        })
    }
}
