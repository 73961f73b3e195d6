//! Core domain model types for conceptflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The fixed stage enumeration and stage status
//! - Stage artifacts
//! - Process views returned by the registry

mod artifact;
mod process;
mod stage;
mod status;

pub use artifact::{checksum, Artifact};
pub use process::{ProcessView, StoredProcess};
pub use stage::{PipelineStage, UnknownStageError};
pub use status::StageStatus;
