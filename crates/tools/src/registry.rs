use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ok_domain::tool::ToolDefinition;

use crate::context::ToolContext;

/// One callable tool. `call` never returns `Err` for a tool-level failure —
/// those are encoded into the returned string so the model can see and
/// react to them; only kernel-level infrastructure failures propagate as
/// `Result` elsewhere in this crate.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, ctx: &ToolContext, args: serde_json::Value) -> String;
}

/// Name-keyed set of callable tools. The kernel builds one registry of
/// built-ins at startup, then clones it per agent with that agent's custom
/// tools layered on top.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.definition().name;
        self.handlers.insert(name, handler);
    }

    /// A copy of this registry with additional (or overriding) handlers
    /// layered on top, used to give one agent custom tools without
    /// mutating the shared built-in set.
    pub fn clone_with(&self, extra: Vec<Arc<dyn ToolHandler>>) -> Self {
        let mut clone = self.clone();
        for handler in extra {
            clone.register(handler);
        }
        clone
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn to_tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.handlers.values().map(|h| h.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition { name: "echo".to_string(), description: "echoes input".to_string(), parameters: json!({}) }
        }

        async fn call(&self, _ctx: &ToolContext, args: serde_json::Value) -> String {
            args.to_string()
        }
    }

    #[test]
    fn clone_with_layers_extra_handlers_without_mutating_the_base() {
        let mut base = ToolRegistry::new();
        base.register(Arc::new(Echo));

        let extended = base.clone_with(vec![]);
        assert_eq!(extended.names(), vec!["echo".to_string()]);
        assert_eq!(base.names(), vec!["echo".to_string()]);
    }

    #[test]
    fn to_tool_definitions_is_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let defs = registry.to_tool_definitions();
        assert_eq!(defs[0].name, "echo");
    }
}
