//! Error types for the conceptflow orchestrator.
//!
//! Any failure raised after a stage was marked `Started` is recorded in the
//! registry as `Error` and halts the pipeline. `Config` and `ProcessBusy`
//! are raised before anything runs and never touch a stage status.

use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::core::PipelineStage;

/// The main error type for conceptflow operations.
#[derive(Debug, Error)]
pub enum ConceptflowError {
    /// A request or stage configuration was rejected before execution.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A stage was asked to run but its upstream artifact does not exist.
    #[error(
        "Missing dependency: stage '{stage}' of process '{process}' requires the \
         '{upstream}' artifact, which does not exist"
    )]
    MissingDependency {
        /// The process name.
        process: String,
        /// The stage that could not run.
        stage: PipelineStage,
        /// The stage whose artifact is missing.
        upstream: PipelineStage,
    },

    /// The stage's domain logic failed.
    #[error("{0}")]
    StageExecution(#[from] StageExecutionError),

    /// A process or artifact lookup failed.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The stage computed its artifact but persisting it failed.
    #[error("Failed to write '{stage}' artifact of process '{process}': {source}")]
    ArtifactWrite {
        /// The process name.
        process: String,
        /// The stage whose artifact could not be written.
        stage: PipelineStage,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// The pipeline was cancelled.
    #[error("Pipeline for process '{process}' cancelled: {reason}")]
    Cancelled {
        /// The process name.
        process: String,
        /// The stage that was interrupted, if one was running.
        stage: Option<PipelineStage>,
        /// The cancellation reason.
        reason: String,
    },

    /// A stage exceeded the configured stage timeout.
    #[error("Stage '{stage}' of process '{process}' timed out after {timeout:?}")]
    StageTimeout {
        /// The process name.
        process: String,
        /// The stage that timed out.
        stage: PipelineStage,
        /// The configured timeout.
        timeout: Duration,
    },

    /// An invocation for the same process name is already in flight.
    #[error("Process '{process}' already has a pipeline in flight")]
    ProcessBusy {
        /// The process name.
        process: String,
    },

    /// An artifact store error outside of a stage write.
    #[error("{0}")]
    Store(StoreError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ConceptflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(not_found) => Self::NotFound(not_found),
            other => Self::Store(other),
        }
    }
}

impl ConceptflowError {
    /// Returns a stable error code for the request layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::MissingDependency { .. } => "MISSING_DEPENDENCY",
            Self::StageExecution(_) => "STAGE_EXECUTION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ArtifactWrite { .. } => "ARTIFACT_WRITE_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::StageTimeout { .. } => "STAGE_TIMEOUT",
            Self::ProcessBusy { .. } => "PROCESS_BUSY",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the stage the error is attributed to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Config(err) => err.stage,
            Self::MissingDependency { stage, .. }
            | Self::ArtifactWrite { stage, .. }
            | Self::StageTimeout { stage, .. } => Some(*stage),
            Self::StageExecution(err) => Some(err.stage),
            Self::NotFound(
                NotFoundError::Artifact { stage, .. } | NotFoundError::Unreadable { stage, .. },
            ) => Some(*stage),
            Self::Cancelled { stage, .. } => *stage,
            _ => None,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), json!(self.code()));
        map.insert("message".to_string(), json!(self.to_string()));
        if let Some(stage) = self.stage() {
            map.insert("stage".to_string(), json!(stage));
        }
        match self {
            Self::MissingDependency { process, upstream, .. } => {
                map.insert("process".to_string(), json!(process));
                map.insert("upstream".to_string(), json!(upstream));
            }
            Self::ArtifactWrite { process, .. }
            | Self::Cancelled { process, .. }
            | Self::StageTimeout { process, .. }
            | Self::ProcessBusy { process } => {
                map.insert("process".to_string(), json!(process));
            }
            Self::Config(err) => {
                if let Some(ref option) = err.option {
                    map.insert("option".to_string(), json!(option));
                }
            }
            _ => {}
        }
        map
    }
}

/// Error raised when configuration or a request is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// The stage whose configuration was rejected, if any.
    pub stage: Option<PipelineStage>,
    /// The offending option, if any.
    pub option: Option<String>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage: None,
            option: None,
        }
    }

    /// Attributes the error to a stage.
    #[must_use]
    pub fn for_stage(mut self, stage: PipelineStage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Records the offending option.
    #[must_use]
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    /// Creates an error for an option the stage does not recognize.
    #[must_use]
    pub fn unrecognized_option(stage: PipelineStage, option: impl Into<String>) -> Self {
        let option = option.into();
        Self::new(format!("stage '{stage}' does not recognize option '{option}'"))
            .for_stage(stage)
            .with_option(option)
    }

    /// Creates an error for an invalid process name.
    #[must_use]
    pub fn invalid_process_name(name: &str, reason: &str) -> Self {
        Self::new(format!("invalid process name '{name}': {reason}"))
    }
}

/// Error raised when a process or artifact cannot be found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    /// The process was never registered.
    #[error("No such process: '{name}'")]
    Process {
        /// The process name.
        name: String,
    },

    /// No artifact exists for (process, stage).
    #[error("No '{stage}' artifact for process '{process}'")]
    Artifact {
        /// The process name.
        process: String,
        /// The stage.
        stage: PipelineStage,
    },

    /// An artifact exists but cannot be read back as a valid artifact.
    #[error("The '{stage}' artifact of process '{process}' cannot be loaded: {reason}")]
    Unreadable {
        /// The process name.
        process: String,
        /// The stage.
        stage: PipelineStage,
        /// Why loading failed.
        reason: String,
    },
}

impl NotFoundError {
    /// Creates a process-not-found error.
    #[must_use]
    pub fn process(name: impl Into<String>) -> Self {
        Self::Process { name: name.into() }
    }

    /// Creates an artifact-not-found error.
    #[must_use]
    pub fn artifact(process: impl Into<String>, stage: PipelineStage) -> Self {
        Self::Artifact {
            process: process.into(),
            stage,
        }
    }
}

/// Error raised by a stage's domain logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stage '{stage}' failed: {message}")]
pub struct StageExecutionError {
    /// The failing stage.
    pub stage: PipelineStage,
    /// The failure message.
    pub message: String,
}

impl StageExecutionError {
    /// Creates a new stage execution error.
    #[must_use]
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Errors raised by an artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The artifact does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The stored artifact could not be read back intact.
    #[error("Artifact '{stage}' of process '{process}' is corrupt: {reason}")]
    Corrupt {
        /// The process name.
        process: String,
        /// The stage.
        stage: PipelineStage,
        /// What was wrong with it.
        reason: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
