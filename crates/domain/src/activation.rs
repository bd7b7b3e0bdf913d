use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque activation identifier.
pub type ActId = Uuid;

/// An agent's address in the workspace, e.g. `"agents/writer.md"`.
pub type AgentPath = String;

/// A queued unit of work: an agent to run and the input to run it with.
///
/// Created by `Kernel::enqueue`; consumed exactly once by the scheduler,
/// which either spawns a session with the same id, discards it as a loop
/// duplicate, or (on a budget halt) pushes it back for a later pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activation {
    pub id: ActId,
    pub agent_id: AgentPath,
    pub input: String,
    pub parent_id: Option<AgentPath>,
    pub spawn_depth: u32,
    /// Ascending priority order — lower runs first. Ties broken by FIFO.
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl Activation {
    pub fn root(agent_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            input: input.into(),
            parent_id: None,
            spawn_depth: 0,
            priority: 0,
            created_at: Utc::now(),
        }
    }

    pub fn child(
        parent: &AgentPath,
        agent_id: impl Into<String>,
        input: impl Into<String>,
        spawn_depth: u32,
        priority: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            input: input.into(),
            parent_id: Some(parent.clone()),
            spawn_depth,
            priority,
            created_at: Utc::now(),
        }
    }

    /// The hash used for loop detection: collapses to `agent_id + input`, so
    /// two activations that would produce an identical session opener are
    /// treated as the same loop iteration regardless of lineage.
    pub fn loop_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.agent_id.hash(&mut hasher);
        b":".hash(&mut hasher);
        self.input.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_hash_is_stable_for_same_agent_and_input() {
        let a = Activation::root("agents/writer.md", "write");
        let b = Activation::root("agents/writer.md", "write");
        assert_eq!(a.loop_hash(), b.loop_hash());
    }

    #[test]
    fn loop_hash_differs_on_input() {
        let a = Activation::root("agents/writer.md", "write");
        let b = Activation::root("agents/writer.md", "rewrite");
        assert_ne!(a.loop_hash(), b.loop_hash());
    }
}
