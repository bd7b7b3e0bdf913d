use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use ok_domain::activation::{ActId, Activation, AgentPath};
use ok_domain::policy::Policy;
use ok_domain::EventSink;
use ok_memory::WorkingMemory;
use ok_vfs::Vfs;

use crate::tasks::TaskQueueStore;
use crate::web::WebAccess;

/// Everything a built-in tool needs to act, assembled fresh per dispatch by
/// the kernel's turn loop. Bundled as a struct rather than threaded as
/// individual parameters because every plugin needs most of it and the set
/// grows as new built-ins are added.
pub struct ToolContext {
    pub vfs: Arc<Vfs>,
    pub working_memory: Option<Arc<WorkingMemory>>,
    pub task_queue: Option<Arc<TaskQueueStore>>,
    pub events: Arc<dyn EventSink>,
    pub web: Arc<dyn WebAccess>,
    pub agent_id: AgentPath,
    pub activation_id: ActId,
    pub parent_id: Option<AgentPath>,
    pub spawn_depth: u32,
    pub max_depth: u32,
    pub max_fanout: u32,
    /// `childCounts[agentId]` as the kernel saw it when this session opened.
    pub sibling_child_count: u32,
    /// This handler's own spawn counter, shared by every tool call made
    /// during the owning session (reset per session, not per call).
    pub local_spawn_count: Arc<AtomicU32>,
    pub policy: Policy,
    pub preferred_model: Option<String>,
    pub enqueue: Arc<dyn Fn(Activation) + Send + Sync>,
}
