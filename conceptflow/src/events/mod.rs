//! Event emission for pipeline observability.
//!
//! The coordinator and stage runner report every decision they take as a
//! [`PipelineEvent`] to an injected [`EventSink`].

mod event;
mod sink;

pub use event::PipelineEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
