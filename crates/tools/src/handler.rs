use ok_domain::events::{EventType, NewEvent};
use ok_domain::tool::ToolCall;
use ok_policy::handler::PolicyDecision;
use serde_json::json;

use crate::context::ToolContext;
use crate::registry::ToolRegistry;

/// Runs one tool call through the full handle contract: log the call, gate
/// it by policy, look the plugin up, invoke it, and log the (truncated)
/// result. Always returns a string — the model-visible content is the
/// untruncated return value; only the logged copy is capped at 500 chars.
pub async fn dispatch(
    ctx: &ToolContext,
    registry: &ToolRegistry,
    is_custom: bool,
    call: &ToolCall,
) -> String {
    ctx.events.append(
        NewEvent::new(EventType::ToolCall, ctx.agent_id.clone())
            .with_activation(ctx.activation_id)
            .with_data(json!({"tool": call.tool_name, "args": call.arguments})),
    );

    let decision = ok_policy::handler::check(&ctx.policy, &call.tool_name, &call.arguments, is_custom);
    if let PolicyDecision::Blocked(reason) = decision {
        ctx.events.append(
            NewEvent::new(EventType::Warning, ctx.agent_id.clone())
                .with_activation(ctx.activation_id)
                .with_data(json!({"tool": call.tool_name, "reason": reason})),
        );
        log_result(ctx, &call.tool_name, &reason);
        return reason;
    }

    let Some(plugin) = registry.get(&call.tool_name) else {
        let message = format!(
            "unknown tool '{}'; available tools: {}",
            call.tool_name,
            registry.names().join(", ")
        );
        log_result(ctx, &call.tool_name, &message);
        return message;
    };

    let result = plugin.call(ctx, call.arguments.clone()).await;
    log_result(ctx, &call.tool_name, &result);
    result
}

fn log_result(ctx: &ToolContext, tool: &str, result: &str) {
    let truncated: String = result.chars().take(500).collect();
    ctx.events.append(
        NewEvent::new(EventType::ToolResult, ctx.agent_id.clone())
            .with_activation(ctx.activation_id)
            .with_data(json!({"tool": tool, "result": truncated})),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use ok_domain::policy::Policy;
    use ok_domain::tool::ToolDefinition;
    use ok_domain::EventSink;
    use ok_memory::WorkingMemory;
    use ok_vfs::Vfs;
    use uuid::Uuid;

    use super::*;
    use crate::registry::ToolHandler;
    use crate::web::StaticWebAccess;

    struct CountingSink {
        count: AtomicU64,
    }

    impl EventSink for CountingSink {
        fn append(&self, _event: NewEvent) -> u64 {
            self.count.fetch_add(1, Ordering::SeqCst)
        }
    }

    struct Upper;

    #[async_trait]
    impl ToolHandler for Upper {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "upper".to_string(),
                description: "uppercases text".to_string(),
                parameters: json!({}),
            }
        }

        async fn call(&self, _ctx: &ToolContext, args: serde_json::Value) -> String {
            args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_uppercase()
        }
    }

    fn test_ctx(events: Arc<dyn EventSink>, policy: Policy) -> ToolContext {
        ToolContext {
            vfs: Vfs::new(),
            working_memory: Some(Arc::new(WorkingMemory::new())),
            task_queue: None,
            events,
            web: Arc::new(StaticWebAccess { search_result: String::new(), fetch_result: String::new() }),
            agent_id: "agents/writer.md".to_string(),
            activation_id: Uuid::new_v4(),
            parent_id: None,
            spawn_depth: 0,
            max_depth: 5,
            max_fanout: 5,
            sibling_child_count: 0,
            local_spawn_count: Arc::new(AtomicU32::new(0)),
            policy,
            preferred_model: None,
            enqueue: Arc::new(|_| {}),
        }
    }

    #[tokio::test]
    async fn successful_call_logs_call_and_result_events() {
        let sink: Arc<dyn EventSink> = Arc::new(CountingSink { count: AtomicU64::new(0) });
        let ctx = test_ctx(sink.clone(), Policy::balanced());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper));

        let call = ToolCall { call_id: "c1".into(), tool_name: "upper".into(), arguments: json!({"text": "hi"}) };
        let result = dispatch(&ctx, &registry, false, &call).await;
        assert_eq!(result, "HI");
    }

    #[tokio::test]
    async fn blocked_tool_short_circuits_without_reaching_the_plugin() {
        let sink: Arc<dyn EventSink> = Arc::new(CountingSink { count: AtomicU64::new(0) });
        let mut policy = Policy::balanced();
        policy.blocked_tools.insert("upper".to_string());
        let ctx = test_ctx(sink, policy);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper));

        let call = ToolCall { call_id: "c1".into(), tool_name: "upper".into(), arguments: json!({"text": "hi"}) };
        let result = dispatch(&ctx, &registry, false, &call).await;
        assert!(result.contains("blocked"));
    }

    #[tokio::test]
    async fn unknown_tool_lists_available_names() {
        let sink: Arc<dyn EventSink> = Arc::new(CountingSink { count: AtomicU64::new(0) });
        let ctx = test_ctx(sink, Policy::balanced());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper));

        let call = ToolCall { call_id: "c1".into(), tool_name: "lower".into(), arguments: json!({}) };
        let result = dispatch(&ctx, &registry, false, &call).await;
        assert!(result.contains("unknown tool"));
        assert!(result.contains("upper"));
    }
}
