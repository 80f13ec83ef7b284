//! Append-only execution trace for one pipeline run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Status carried by a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// A stage was entered
    Start,

    /// The stage completed successfully
    Ok,

    /// The stage completed with a failure
    Fail,

    /// The stage was entered but had nothing to do
    Skipped,
}

impl TraceStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Start => "start",
            TraceStatus::Ok => "ok",
            TraceStatus::Fail => "fail",
            TraceStatus::Skipped => "skipped",
        }
    }

    /// Whether this status closes a stage
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TraceStatus::Start)
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the execution trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,

    /// Stage name (e.g. "fetch", "extract_local", "qc")
    pub step: String,

    /// Event status
    pub status: TraceStatus,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TraceEvent {
    /// Create an event stamped with the current time
    ///
    /// Metadata that is not a JSON object is stored under the key `value`.
    pub fn now(step: impl Into<String>, status: TraceStatus, metadata: Value) -> Self {
        let metadata = match metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            timestamp: Utc::now(),
            step: step.into(),
            status,
            metadata,
        }
    }
}

/// Ordered, append-only log of trace events
///
/// Events can only be appended. Earlier entries cannot be edited, removed or
/// reordered; [`TraceLog::snapshot`] hands out a copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TraceLog {
    events: Vec<TraceEvent>,
}

impl TraceLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// Append an event stamped with the current time
    pub fn record(&mut self, step: &str, status: TraceStatus, metadata: Value) {
        self.push(TraceEvent::now(step, status, metadata));
    }

    /// Append a `start` event with no metadata
    pub fn start(&mut self, step: &str) {
        self.record(step, TraceStatus::Start, Value::Null);
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over events in append order
    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    /// The most recent event
    pub fn last(&self) -> Option<&TraceEvent> {
        self.events.last()
    }

    /// Copy of the events for output
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.events.clone()
    }

    /// Step names of all stages entered, in order
    pub fn steps_entered(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.status == TraceStatus::Start)
            .map(|e| e.step.as_str())
            .collect()
    }

    /// Whether every `start` is immediately closed by exactly one terminal
    /// event for the same step, and timestamps never go backwards
    pub fn is_balanced(&self) -> bool {
        let mut open: Option<&str> = None;
        for event in &self.events {
            match (open, event.status.is_terminal()) {
                (None, false) => open = Some(event.step.as_str()),
                (Some(step), true) if step == event.step => open = None,
                _ => return false,
            }
        }
        let ordered = self
            .events
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp);
        open.is_none() && ordered
    }
}
