//! Testing utilities for conceptflow pipelines.
//!
//! This module provides:
//! - Stage doubles that record, fail or stall
//! - Sample inputs and an in-memory orchestrator harness
//! - Assertions on process views

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_all_finished, assert_stage_error, assert_stage_status, assert_stage_untouched,
};
pub use fixtures::{recording_stage_set, recording_stage_set_with, sample_documents, TestHarness};
pub use mocks::{CallLog, FailingStage, RecordingStage, SlowStage};
