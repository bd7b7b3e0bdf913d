//! Observable session store: the Kernel's live and completed sessions,
//! mirrored here so external consumers (a UI, a metrics scraper) can read
//! session state without reaching into the scheduler itself. The Kernel
//! remains the sole writer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ok_domain::activation::{ActId, Activation, AgentPath};
use ok_domain::tool::Message;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Running,
    Completed,
    Error,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
    pub result: String,
    pub blocked: bool,
    pub timestamp: DateTime<Utc>,
}

/// The live execution context of one activation. `cancel` is not
/// serializable and is skipped when a `Session` needs to cross a
/// serialization boundary (it never does today, but the derive would
/// otherwise fail to compile).
#[derive(Clone)]
pub struct Session {
    pub agent_id: AgentPath,
    pub activation_id: ActId,
    pub status: SessionStatus,
    pub history: Vec<Message>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub token_count: u64,
    pub cancel: CancellationToken,
}

impl Session {
    pub fn open(activation: &Activation, cancel: CancellationToken) -> Self {
        Self {
            agent_id: activation.agent_id.clone(),
            activation_id: activation.id,
            status: SessionStatus::Running,
            history: vec![Message::user(activation.input.clone())],
            tool_calls: Vec::new(),
            token_count: 0,
            cancel,
        }
    }
}

/// Shared, internally-serialized mirror of active and completed sessions.
pub struct SessionStore {
    active: RwLock<HashMap<ActId, Session>>,
    completed: RwLock<Vec<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { active: RwLock::new(HashMap::new()), completed: RwLock::new(Vec::new()) }
    }

    pub fn register(&self, session: Session) {
        self.active.write().insert(session.activation_id, session);
    }

    pub fn get(&self, activation_id: ActId) -> Option<Session> {
        self.active.read().get(&activation_id).cloned()
    }

    pub fn mutate(&self, activation_id: ActId, f: impl FnOnce(&mut Session)) {
        if let Some(session) = self.active.write().get_mut(&activation_id) {
            f(session);
        }
    }

    /// Move a session from active to completed. No-op if it was never
    /// registered (defensive: callers should not hit this in practice).
    pub fn close(&self, activation_id: ActId) {
        if let Some(session) = self.active.write().remove(&activation_id) {
            self.completed.write().push(session);
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    pub fn completed(&self) -> Vec<Session> {
        self.completed.read().clone()
    }

    pub fn active(&self) -> Vec<Session> {
        self.active.read().values().cloned().collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_seeds_history_with_the_activation_input() {
        let activation = Activation::root("agents/writer.md", "write the report");
        let session = Session::open(&activation, CancellationToken::new());
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].text(), "write the report");
    }

    #[test]
    fn register_then_close_moves_session_to_completed() {
        let store = SessionStore::new();
        let activation = Activation::root("agents/writer.md", "write");
        let session = Session::open(&activation, CancellationToken::new());
        let id = session.activation_id;

        store.register(session);
        assert_eq!(store.active_count(), 1);

        store.mutate(id, |s| s.status = SessionStatus::Completed);
        store.close(id);

        assert_eq!(store.active_count(), 0);
        assert_eq!(store.completed().len(), 1);
        assert_eq!(store.completed()[0].status, SessionStatus::Completed);
    }
}
