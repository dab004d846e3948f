//! Append-only agent log and the `EventSink` surface the core publishes
//! progress through (§6, §9 "message passing").
//!
//! Rather than mutating a shared agent-state object across stages, each
//! stage returns its immutable output value plus a vector of log entries to
//! append; `AgentLog` only ever grows.

use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::model::{LogEntry, LogKind};

/// An append-only log carried alongside the pipeline's immutable value
/// chain. Cheap to clone (`Arc` internally) so every stage can hold a
/// handle without threading `&mut` through the whole pipeline.
#[derive(Debug, Clone, Default)]
pub struct AgentLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl AgentLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, stage: impl Into<String>, kind: LogKind, payload: Value) {
        let entry = LogEntry {
            stage: stage.into(),
            kind,
            payload,
        };
        self.entries
            .lock()
            .expect("agent log mutex poisoned")
            .push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("agent log mutex poisoned").clone()
    }
}

/// Progress-event surface the core publishes through; the orchestrator
/// (out of core scope) implements this to persist/broadcast. Stage strings
/// are `"loader"|"ocr"|"ingestor"|"comparator"|"reviewer"`; kinds are
/// `"thought"|"finding"|"complete"|"error"` (§6).
pub trait EventSink: Send + Sync {
    fn publish(&self, stage: &str, kind: LogKind, payload: Value);
}

/// An `EventSink` that also appends to an [`AgentLog`], matching the
/// pattern used by every stage in this pipeline: publish for the live
/// orchestrator, log for the returned `ComparisonResult.agent_log`.
pub struct LoggingEventSink {
    log: AgentLog,
}

impl LoggingEventSink {
    #[must_use]
    pub fn new(log: AgentLog) -> Self {
        Self { log }
    }
}

impl EventSink for LoggingEventSink {
    fn publish(&self, stage: &str, kind: LogKind, payload: Value) {
        self.log.push(stage, kind, payload);
    }
}

/// An `EventSink` that discards every event; useful in tests and for
/// invocations that don't need live progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _stage: &str, _kind: LogKind, _payload: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_accumulates_across_clones() {
        let log = AgentLog::new();
        let sink = LoggingEventSink::new(log.clone());
        sink.publish("loader", LogKind::Thought, json!({"note": "rasterized"}));
        sink.publish("ocr", LogKind::Complete, json!({"regions": 12}));
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].stage, "loader");
    }

    #[test]
    fn null_sink_is_a_no_op() {
        let sink = NullEventSink;
        sink.publish("ocr", LogKind::Error, json!({}));
    }
}
