use std::sync::atomic::Ordering;

use async_trait::async_trait;
use ok_domain::activation::Activation;
use ok_domain::tool::ToolDefinition;
use ok_memory::working::NewEntry;
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn tags_arg(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

pub struct VfsRead;

#[async_trait]
impl ToolHandler for VfsRead {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "vfs_read".to_string(),
            description: "Read the current content of a file in the shared workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let path = str_arg(&args, "path");
        match ctx.vfs.read(path) {
            Some(file) => file.content,
            None => format!("no file at '{path}'"),
        }
    }
}

pub struct VfsWrite;

#[async_trait]
impl ToolHandler for VfsWrite {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "vfs_write".to_string(),
            description: "Write (or overwrite) a file in the shared workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
                "required": ["path", "content"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let path = str_arg(&args, "path");
        let content = str_arg(&args, "content");
        let file = ctx.vfs.write(path, content, ctx.agent_id.clone());
        format!("wrote '{path}' (version {})", file.current_version())
    }
}

pub struct VfsList;

#[async_trait]
impl ToolHandler for VfsList {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "vfs_list".to_string(),
            description: "List every path under a prefix in the shared workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"prefix": {"type": "string"}},
                "required": ["prefix"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let prefix = str_arg(&args, "prefix");
        let paths = ctx.vfs.list(prefix);
        if paths.is_empty() {
            format!("no paths under '{prefix}'")
        } else {
            paths.join("\n")
        }
    }
}

pub struct VfsDelete;

#[async_trait]
impl ToolHandler for VfsDelete {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "vfs_delete".to_string(),
            description: "Delete a file from the shared workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let path = str_arg(&args, "path");
        match ctx.vfs.delete(path) {
            Some(_) => format!("deleted '{path}'"),
            None => format!("no file at '{path}' to delete"),
        }
    }
}

pub struct SpawnAgent;

#[async_trait]
impl ToolHandler for SpawnAgent {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "spawn_agent".to_string(),
            description: "Spawn a child agent and enqueue it to run with a task.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_path": {"type": "string", "description": "VFS path of the agent profile to run, e.g. agents/writer.md"},
                    "task": {"type": "string"},
                },
                "required": ["agent_path", "task"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        if ctx.spawn_depth + 1 >= ctx.max_depth {
            return format!(
                "spawn rejected: depth limit reached ({} >= {})",
                ctx.spawn_depth + 1,
                ctx.max_depth
            );
        }

        let local = ctx.local_spawn_count.load(Ordering::SeqCst);
        if ctx.sibling_child_count + local >= ctx.max_fanout {
            return format!(
                "spawn rejected: fanout limit reached for '{}' ({} >= {})",
                ctx.agent_id,
                ctx.sibling_child_count + local,
                ctx.max_fanout
            );
        }

        let agent_path = str_arg(&args, "agent_path").to_string();
        let task = str_arg(&args, "task").to_string();
        let activation = Activation::child(&ctx.agent_id, agent_path.clone(), task, ctx.spawn_depth + 1, ctx.spawn_depth as i32 + 1);
        let id = activation.id;
        (ctx.enqueue)(activation);
        ctx.local_spawn_count.fetch_add(1, Ordering::SeqCst);
        ctx.events.append(
            ok_domain::events::NewEvent::new(ok_domain::events::EventType::Spawn, ctx.agent_id.clone())
                .with_activation(ctx.activation_id)
                .with_data(json!({"child_agent_path": agent_path, "child_activation_id": id.to_string()})),
        );
        format!("spawned '{agent_path}' as activation {id}")
    }
}

pub struct SignalParent;

#[async_trait]
impl ToolHandler for SignalParent {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "signal_parent".to_string(),
            description: "Send a message back to the parent agent, re-enqueuing it.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let Some(parent_id) = &ctx.parent_id else {
            return "cannot signal parent: this agent has no parent".to_string();
        };
        let message = str_arg(&args, "message");
        let input = format!("[signal from {}]: {message}", ctx.agent_id);
        let activation = Activation::child(&ctx.agent_id, parent_id.clone(), input, ctx.spawn_depth.saturating_sub(1), 0);
        let id = activation.id;
        (ctx.enqueue)(activation);
        ctx.events.append(
            ok_domain::events::NewEvent::new(ok_domain::events::EventType::Signal, ctx.agent_id.clone())
                .with_activation(ctx.activation_id)
                .with_data(json!({"parent": parent_id, "message": message})),
        );
        format!("signaled '{parent_id}' as activation {id}")
    }
}

pub struct MemoryRead;

#[async_trait]
impl ToolHandler for MemoryRead {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "memory_read".to_string(),
            description: "Search this run's working memory by text and optional tags.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                },
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let Some(memory) = &ctx.working_memory else {
            return "working memory is not available in this session".to_string();
        };
        let query = str_arg(&args, "query");
        let tags = tags_arg(&args, "tags");
        let tags_ref = if tags.is_empty() { None } else { Some(tags.as_slice()) };
        let entries = memory.read(query, tags_ref);
        if entries.is_empty() {
            "no matching working-memory entries".to_string()
        } else {
            entries.iter().map(|e| format!("[{}] {}: {}", e.author, e.key, e.value)).collect::<Vec<_>>().join("\n")
        }
    }
}

pub struct MemoryWrite;

#[async_trait]
impl ToolHandler for MemoryWrite {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "memory_write".to_string(),
            description: "Record a key/value note in this run's working memory.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string"},
                    "value": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["key", "value"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let Some(memory) = &ctx.working_memory else {
            return "working memory is not available in this session".to_string();
        };
        let key = str_arg(&args, "key").to_string();
        let value = str_arg(&args, "value").to_string();
        let tags = tags_arg(&args, "tags");
        memory.write(NewEntry { key: key.clone(), value, tags, author: ctx.agent_id.clone() });
        format!("wrote working-memory entry '{key}'")
    }
}

pub struct WebSearch;

#[async_trait]
impl ToolHandler for WebSearch {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".to_string(),
            description: "Search the web and return raw results.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let query = str_arg(&args, "query");
        match ctx.web.search(query).await {
            Ok(result) => result,
            Err(e) => format!("web search failed: {e}"),
        }
    }
}

pub struct WebFetch;

#[async_trait]
impl ToolHandler for WebFetch {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_fetch".to_string(),
            description: "Fetch a URL and return its body.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let url = str_arg(&args, "url");
        match ctx.web.fetch(url).await {
            Ok(result) => result,
            Err(e) => format!("web fetch failed: {e}"),
        }
    }
}

pub struct TaskQueueRead;

#[async_trait]
impl ToolHandler for TaskQueueRead {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "task_queue_read".to_string(),
            description: "List pending tasks in the run's task queue.".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, ctx: &ToolContext, _args: Value) -> String {
        let Some(queue) = &ctx.task_queue else {
            return "no task queue is attached to this run".to_string();
        };
        let pending = queue.pending();
        if pending.is_empty() {
            "no pending tasks".to_string()
        } else {
            pending.iter().map(|t| format!("#{}: {}", t.id, t.description)).collect::<Vec<_>>().join("\n")
        }
    }
}

pub struct TaskQueueWrite;

#[async_trait]
impl ToolHandler for TaskQueueWrite {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "task_queue_write".to_string(),
            description: "Add a task, or mark one done by id, in the run's task queue.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "description": {"type": "string", "description": "set to add a new task"},
                    "complete_id": {"type": "integer", "description": "set to mark an existing task done"},
                },
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let Some(queue) = &ctx.task_queue else {
            return "no task queue is attached to this run".to_string();
        };
        if let Some(id) = args.get("complete_id").and_then(|v| v.as_u64()) {
            return if queue.complete(id) { format!("marked task #{id} done") } else { format!("no task #{id}") };
        }
        let description = str_arg(&args, "description");
        if description.is_empty() {
            return "task_queue_write requires either 'description' or 'complete_id'".to_string();
        }
        let item = queue.add(description, ctx.agent_id.clone());
        format!("added task #{} ", item.id)
    }
}

fn knowledge_path(topic: &str, agent_id: &str) -> String {
    let slug: String = agent_id.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect();
    format!("workflows/knowledge/{topic}/{slug}.md")
}

pub struct KnowledgeContribute;

#[async_trait]
impl ToolHandler for KnowledgeContribute {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "knowledge_contribute".to_string(),
            description: "Share a finding under a topic for other agents to subscribe to.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"topic": {"type": "string"}, "content": {"type": "string"}},
                "required": ["topic", "content"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let topic = str_arg(&args, "topic");
        let content = str_arg(&args, "content");
        let path = knowledge_path(topic, &ctx.agent_id);
        ctx.vfs.write(&path, content, ctx.agent_id.clone());
        format!("contributed to topic '{topic}'")
    }
}

pub struct KnowledgePublish;

#[async_trait]
impl ToolHandler for KnowledgePublish {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "knowledge_publish".to_string(),
            description: "Publish (replace) this agent's current entry under a topic.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"topic": {"type": "string"}, "content": {"type": "string"}},
                "required": ["topic", "content"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        KnowledgeContribute.call(ctx, args).await.replace("contributed to", "published to")
    }
}

pub struct KnowledgeSubscribe;

#[async_trait]
impl ToolHandler for KnowledgeSubscribe {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "knowledge_subscribe".to_string(),
            description: "Read every contribution under a topic from every agent.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"topic": {"type": "string"}},
                "required": ["topic"],
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> String {
        let topic = str_arg(&args, "topic");
        let prefix = format!("workflows/knowledge/{topic}/");
        let paths = ctx.vfs.list(&prefix);
        if paths.is_empty() {
            return format!("no contributions under topic '{topic}'");
        }
        paths
            .iter()
            .filter_map(|p| ctx.vfs.read(p))
            .map(|f| format!("--- {} ---\n{}", f.path, f.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    use ok_domain::policy::Policy;
    use ok_domain::EventSink;
    use ok_memory::working::WorkingMemory;
    use ok_vfs::Vfs;
    use uuid::Uuid;

    use super::*;
    use crate::tasks::TaskQueueStore;
    use crate::web::StaticWebAccess;

    struct NoopSink;
    impl EventSink for NoopSink {
        fn append(&self, _event: ok_domain::events::NewEvent) -> u64 {
            0
        }
    }

    fn ctx_with(vfs: std::sync::Arc<Vfs>, max_depth: u32, max_fanout: u32, sibling_child_count: u32) -> ToolContext {
        ToolContext {
            vfs,
            working_memory: Some(Arc::new(WorkingMemory::new())),
            task_queue: Some(Arc::new(TaskQueueStore::new())),
            events: Arc::new(NoopSink),
            web: Arc::new(StaticWebAccess { search_result: "search ok".to_string(), fetch_result: "fetch ok".to_string() }),
            agent_id: "agents/writer.md".to_string(),
            activation_id: Uuid::new_v4(),
            parent_id: Some("agents/root.md".to_string()),
            spawn_depth: 0,
            max_depth,
            max_fanout,
            sibling_child_count,
            local_spawn_count: Arc::new(AtomicU32::new(0)),
            policy: Policy::balanced(),
            preferred_model: None,
            enqueue: Arc::new(|_| {}),
        }
    }

    #[tokio::test]
    async fn vfs_write_then_read_round_trips() {
        let vfs = Vfs::new();
        let ctx = ctx_with(vfs, 5, 5, 0);
        VfsWrite.call(&ctx, json!({"path": "artifacts/x.md", "content": "hi"})).await;
        let read = VfsRead.call(&ctx, json!({"path": "artifacts/x.md"})).await;
        assert_eq!(read, "hi");
    }

    #[tokio::test]
    async fn spawn_agent_enqueues_when_within_limits() {
        let vfs = Vfs::new();
        let mut ctx = ctx_with(vfs, 5, 5, 0);
        let enqueued = Arc::new(parking_lot::Mutex::new(None));
        let enqueued_clone = enqueued.clone();
        ctx.enqueue = Arc::new(move |a| *enqueued_clone.lock() = Some(a));

        let result = SpawnAgent.call(&ctx, json!({"agent_path": "agents/child.md", "task": "do it"})).await;
        assert!(result.starts_with("spawned"));
        assert!(enqueued.lock().is_some());
        assert_eq!(ctx.local_spawn_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn spawn_agent_rejects_past_the_fanout_limit() {
        let vfs = Vfs::new();
        let ctx = ctx_with(vfs, 5, 2, 2);
        let result = SpawnAgent.call(&ctx, json!({"agent_path": "agents/child.md", "task": "do it"})).await;
        assert!(result.contains("fanout limit"));
    }

    #[tokio::test]
    async fn signal_parent_without_a_parent_is_rejected() {
        let vfs = Vfs::new();
        let mut ctx = ctx_with(vfs, 5, 5, 0);
        ctx.parent_id = None;
        let result = SignalParent.call(&ctx, json!({"message": "done"})).await;
        assert!(result.contains("no parent"));
    }

    #[tokio::test]
    async fn knowledge_contribute_then_subscribe_sees_it() {
        let vfs = Vfs::new();
        let ctx = ctx_with(vfs, 5, 5, 0);
        KnowledgeContribute.call(&ctx, json!({"topic": "pricing", "content": "use tiered plans"})).await;
        let result = KnowledgeSubscribe.call(&ctx, json!({"topic": "pricing"})).await;
        assert!(result.contains("use tiered plans"));
    }

    #[tokio::test]
    async fn task_queue_write_then_read_round_trips() {
        let vfs = Vfs::new();
        let ctx = ctx_with(vfs, 5, 5, 0);
        TaskQueueWrite.call(&ctx, json!({"description": "ship it"})).await;
        let result = TaskQueueRead.call(&ctx, json!({})).await;
        assert!(result.contains("ship it"));
    }
}
