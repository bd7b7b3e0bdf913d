use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activation::ActId;

/// Stable event type tags. Every appended event carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Activation,
    Spawn,
    Signal,
    ToolCall,
    ToolResult,
    FileChange,
    Warning,
    Error,
    Complete,
    WorkflowStep,
}

/// An event as submitted for appending, before the log assigns it an id and
/// timestamp.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub agent_id: String,
    pub activation_id: Option<ActId>,
    pub data: serde_json::Value,
}

impl NewEvent {
    pub fn new(event_type: EventType, agent_id: impl Into<String>) -> Self {
        Self { event_type, agent_id: agent_id.into(), activation_id: None, data: serde_json::Value::Null }
    }

    pub fn with_activation(mut self, activation_id: ActId) -> Self {
        self.activation_id = Some(activation_id);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// A stored, append-only event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub agent_id: String,
    pub activation_id: Option<ActId>,
    pub data: serde_json::Value,
}

/// Narrow seam the tool handler (and anything else outside `ok-core`) uses
/// to append events, so those crates depend only on this trait rather than
/// on `ok-core`'s concrete `EventLog` (which itself depends on `ok-tools`
/// for dispatch — a direct dependency the other way would cycle).
pub trait EventSink: Send + Sync {
    fn append(&self, event: NewEvent) -> u64;
}
