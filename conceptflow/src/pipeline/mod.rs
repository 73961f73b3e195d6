//! Pipeline execution.
//!
//! This module provides:
//! - The skip/overwrite policy and per-stage decisions
//! - The stage runner, which executes one stage against the store
//! - The coordinator, which runs an invocation on a background task
//! - Handles and reports for running invocations

mod coordinator;
mod handle;
mod policy;
mod request;
mod runner;


pub use coordinator::{PipelineCoordinator, DEFAULT_MAX_CONCURRENT_PIPELINES};
pub use handle::{PipelineHandle, PipelineReport, ReportedError, StageReport};
pub use policy::{SkipPolicy, StageDecision};
pub use request::PipelineRequest;
pub use runner::{Invocation, StageOutcome, StageRunner};
