use serde::Serialize;

/// Structured trace events emitted across all kernel crates, independent of
/// the queryable `EventLog` — these are for operator-facing logs
/// (`tracing-subscriber` sinks), not for replay or checkpointing.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionOpened {
        activation_id: String,
        agent_id: String,
        spawn_depth: u32,
    },
    SessionClosed {
        activation_id: String,
        status: String,
        turns: u32,
        tokens: u64,
    },
    PolicyEscalated {
        activation_id: String,
        trigger: String,
    },
    ToolDispatched {
        activation_id: String,
        tool_name: String,
        blocked: bool,
    },
    QuotaHalt {
        reason: String,
    },
    BudgetHalt {
        total_tokens: u64,
        budget: u64,
    },
    VfsWrite {
        path: String,
        version: usize,
        diff_lines: usize,
    },
    CheckpointTrimmed {
        retained: usize,
        dropped: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "kernel_event");
    }
}
