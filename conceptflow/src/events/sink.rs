//! Event sink trait and implementations.

use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

use super::PipelineEvent;

/// Trait for sinks that receive pipeline events.
///
/// Emission must never fail or block for long: it happens inline on the
/// coordinator task.
pub trait EventSink: Send + Sync {
    /// Emits an event.
    fn emit(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level used for non-failure events.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        let event_type = event.event_type();
        let process = event.process();
        let stage = event.stage().map(|s| s.as_str());

        if matches!(
            event,
            PipelineEvent::StageFailed { .. } | PipelineEvent::PipelineFailed { .. }
        ) {
            warn!(event_type, process, ?stage, event_data = ?event, "Event: {}", event_type);
            return;
        }

        match self.level {
            Level::DEBUG | Level::TRACE => {
                debug!(event_type, process, ?stage, "Event: {}", event_type);
            }
            _ => {
                info!(event_type, process, ?stage, "Event: {}", event_type);
            }
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns the event types matching a prefix, in emission order.
    #[must_use]
    pub fn types_with_prefix(&self, type_prefix: &str) -> Vec<&'static str> {
        self.events
            .read()
            .iter()
            .map(PipelineEvent::event_type)
            .filter(|t| t.starts_with(type_prefix))
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineStage;
    use uuid::Uuid;

    fn started(stage: PipelineStage) -> PipelineEvent {
        PipelineEvent::StageStarted {
            process: "p".to_string(),
            run_id: Uuid::nil(),
            stage,
        }
    }

    #[test]
    fn test_noop_and_logging_sinks() {
        NoOpEventSink.emit(&started(PipelineStage::Data));
        LoggingEventSink::default().emit(&started(PipelineStage::Data));
        LoggingEventSink::debug().emit(&PipelineEvent::StageFailed {
            process: "p".to_string(),
            run_id: Uuid::nil(),
            stage: PipelineStage::Graph,
            error: "boom".to_string(),
        });
        // Should not panic
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&PipelineEvent::PipelineStarted {
            process: "p".to_string(),
            run_id: Uuid::nil(),
        });
        sink.emit(&started(PipelineStage::Data));
        sink.emit(&started(PipelineStage::Embedding));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.types_with_prefix("stage."), vec!["stage.started", "stage.started"]);

        sink.clear();
        assert!(sink.is_empty());
    }
}
