//! The tool registry and handle contract: built-in tools the kernel exposes
//! to every agent turn, gated by policy and logged to the event stream.

pub mod builtins;
pub mod context;
pub mod handler;
pub mod registry;
pub mod tasks;
pub mod web;

pub use context::ToolContext;
pub use handler::dispatch;
pub use registry::{ToolHandler, ToolRegistry};
pub use tasks::{TaskItem, TaskQueueStore, TaskStatus};
pub use web::{ReqwestWebAccess, StaticWebAccess, WebAccess};

use std::sync::Arc;

/// The built-in tool set every agent gets before custom tools are layered
/// on top.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(builtins::VfsRead));
    registry.register(Arc::new(builtins::VfsWrite));
    registry.register(Arc::new(builtins::VfsList));
    registry.register(Arc::new(builtins::VfsDelete));
    registry.register(Arc::new(builtins::SpawnAgent));
    registry.register(Arc::new(builtins::SignalParent));
    registry.register(Arc::new(builtins::MemoryRead));
    registry.register(Arc::new(builtins::MemoryWrite));
    registry.register(Arc::new(builtins::WebSearch));
    registry.register(Arc::new(builtins::WebFetch));
    registry.register(Arc::new(builtins::TaskQueueRead));
    registry.register(Arc::new(builtins::TaskQueueWrite));
    registry.register(Arc::new(builtins::KnowledgeContribute));
    registry.register(Arc::new(builtins::KnowledgePublish));
    registry.register(Arc::new(builtins::KnowledgeSubscribe));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_exposes_every_built_in_tool() {
        let names = builtin_registry().names();
        assert!(names.contains(&"vfs_read".to_string()));
        assert!(names.contains(&"spawn_agent".to_string()));
        assert!(names.contains(&"knowledge_subscribe".to_string()));
        assert_eq!(names.len(), 15);
    }
}
