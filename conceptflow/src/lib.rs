//! # Conceptflow
//!
//! Orchestration engine for the concept pipeline: documents are prepared,
//! embedded, clustered and finally turned into concept graphs.
//!
//! Conceptflow runs the four stages in a fixed order for a named process
//! and provides:
//!
//! - **Artifact-driven execution**: a stage whose artifact already exists is
//!   skipped, overwritten or run according to the request's policy
//! - **Process registry**: per-stage status of every process, safe to query
//!   while pipelines run
//! - **Background execution**: pipelines run on tokio tasks with join and
//!   cancel handles and a bounded number of concurrent invocations
//! - **Pluggable stages**: each stage is a [`stages::StageContract`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conceptflow::prelude::*;
//!
//! let stages = StageSet::builder()
//!     .with(Typed::new(Preprocessor::default()))
//!     .with(Typed::new(PhraseEmbedder::default()))
//!     .with(Typed::new(ConceptClusterer::default()))
//!     .with(Typed::new(GraphBuilder::default()))
//!     .build()?;
//!
//! let orchestrator = Orchestrator::open(OrchestratorConfig::default(), stages).await?;
//! let start = orchestrator
//!     .start_pipeline(
//!         PipelineRequest::for_process("corpus1")
//!             .with_documents(bundle)
//!             .wait_for_completion(true),
//!     )
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod stages;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::OrchestratorConfig;
    pub use crate::core::{Artifact, PipelineStage, ProcessView, StageStatus, StoredProcess};
    pub use crate::errors::{
        ConceptflowError, ConfigError, NotFoundError, StageExecutionError, StoreError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::orchestrator::{Orchestrator, PipelineStart};
    pub use crate::pipeline::{
        PipelineHandle, PipelineReport, PipelineRequest, SkipPolicy, StageDecision,
    };
    pub use crate::registry::ProcessRegistry;
    pub use crate::stages::{
        Document, DocumentBundle, DocumentSource, Language, StageConfig, StageContext,
        StageContract, StageInput, StageSet, Typed, TypedStage,
    };
    pub use crate::store::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
    pub use crate::utils::{iso_timestamp, Timestamp};
}
