use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ok_domain::activation::{ActId, Activation, AgentPath};
use ok_domain::config::{KernelConfig, DEFAULT_MODEL};
use ok_domain::events::{EventSink, EventType, NewEvent};
use ok_domain::stream::looks_like_quota_error;
use ok_domain::tool::Message;
use ok_domain::trace::TraceEvent;
use ok_memory::working::{NewEntry, WorkingMemory};
use ok_memory::MemoryPromptSource;
use ok_providers::{AIProvider, ChatContext, SessionRegisterable};
use ok_sessions::{Session, SessionStatus, SessionStore, ToolCallRecord};
use ok_tools::{TaskQueueStore, ToolContext, ToolRegistry, WebAccess};
use ok_vfs::Vfs;
use parking_lot::RwLock;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::agent_registry::AgentRegistry;
use crate::eventlog::EventLog;
use crate::turn::run_turn;

/// Everything the kernel needs from the outside world, bundled the way
/// `spec.md` §4.11 bundles `AutonomousRunner`'s `deps` — a fresh `Kernel`
/// per run cycle is built from one of these plus a `KernelConfig`.
pub struct KernelDeps {
    pub provider: Arc<dyn AIProvider>,
    pub agents: Arc<AgentRegistry>,
    pub vfs: Arc<Vfs>,
    pub events: Arc<EventLog>,
    pub working_memory: Option<Arc<WorkingMemory>>,
    pub memory_prompt_source: Option<Arc<dyn MemoryPromptSource>>,
    pub task_queue: Option<Arc<TaskQueueStore>>,
    pub web: Arc<dyn WebAccess>,
    pub tool_registry: ToolRegistry,
    /// Optional capability probe: providers that need to know which agent
    /// path a session id belongs to (e.g. a scripted test double keyed by
    /// agent path) implement this; the kernel registers every session
    /// before its first turn when a provider supports it.
    pub session_registerable: Option<Arc<dyn SessionRegisterable>>,
}

fn looks_like_failure(result: &str) -> bool {
    let lower = result.to_lowercase();
    result.is_empty()
        || lower.starts_with("error:")
        || lower.contains("not found")
        || lower.contains("policy blocked")
        || lower.contains("permission denied")
        || lower.contains("failed to")
        || lower.contains("invalid")
}

fn looks_blocked(result: &str) -> bool {
    let lower = result.to_lowercase();
    lower.contains("is not permitted")
        || lower.contains("is blocked by policy")
        || lower.contains("is outside the allowed")
        || lower.contains("not in the allowed-tools list")
        || lower.contains("custom tools are not permitted")
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// The scheduler. Owns its queue, active/completed sessions (via
/// `ok_sessions::SessionStore`, which it is the sole writer of),
/// per-agent child counts, the loop-detection hash set, and every halt
/// flag, exactly as `spec.md` §4.9 lists. Every other piece of shared
/// state (VFS, memory, event log, task queue) is an `Arc` handle from
/// `KernelDeps` with its own internal synchronization.
pub struct Kernel {
    config: KernelConfig,
    deps: KernelDeps,

    queue: RwLock<Vec<Activation>>,
    sessions: Arc<SessionStore>,
    child_counts: RwLock<HashMap<AgentPath, u32>>,
    seen_hashes: RwLock<HashSet<u64>>,
    total_tokens: AtomicU64,
    paused: AtomicBool,
    quota_halt_triggered: AtomicBool,
    budget_halt_triggered: AtomicBool,
    wrap_up_injected: AtomicBool,
    global_cancel: RwLock<CancellationToken>,
    working_memory_snapshot: RwLock<Option<ok_memory::working::Snapshot>>,
    semaphore: Arc<crate::semaphore::Semaphore>,
}

impl Kernel {
    pub fn new(config: KernelConfig, deps: KernelDeps) -> Arc<Self> {
        let semaphore = crate::semaphore::Semaphore::new(config.max_concurrency);
        Arc::new(Self {
            semaphore,
            config,
            deps,
            queue: RwLock::new(Vec::new()),
            sessions: Arc::new(SessionStore::new()),
            child_counts: RwLock::new(HashMap::new()),
            seen_hashes: RwLock::new(HashSet::new()),
            total_tokens: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            quota_halt_triggered: AtomicBool::new(false),
            budget_halt_triggered: AtomicBool::new(false),
            wrap_up_injected: AtomicBool::new(false),
            global_cancel: RwLock::new(CancellationToken::new()),
            working_memory_snapshot: RwLock::new(None),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::SeqCst)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.read().len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn working_memory_snapshot(&self) -> Option<ok_memory::working::Snapshot> {
        self.working_memory_snapshot.read().clone()
    }

    /// Insert, keeping the queue sorted ascending by priority with FIFO
    /// tie-breaking (an equal-priority activation always lands after
    /// everything already queued at that priority), then drive the
    /// scheduler loop.
    pub fn enqueue(self: &Arc<Self>, activation: Activation) {
        {
            let mut queue = self.queue.write();
            let pos = queue.partition_point(|a| a.priority <= activation.priority);
            queue.insert(pos, activation);
        }
        self.process_queue();
    }

    pub fn process_queue(self: &Arc<Self>) {
        loop {
            if self.paused.load(Ordering::SeqCst) || self.global_cancel.read().is_cancelled() {
                return;
            }
            if self.semaphore.available() == 0 {
                return;
            }

            let activation = {
                let mut queue = self.queue.write();
                if queue.is_empty() {
                    return;
                }
                queue.remove(0)
            };

            let loop_hash = activation.loop_hash();
            let is_duplicate = {
                let mut seen = self.seen_hashes.write();
                if seen.contains(&loop_hash) {
                    true
                } else {
                    seen.insert(loop_hash);
                    false
                }
            };
            if is_duplicate {
                self.deps.events.append(
                    NewEvent::new(EventType::Warning, activation.agent_id.clone())
                        .with_activation(activation.id)
                        .with_data(json!({"reason": "duplicate activation skipped (loop detected)"})),
                );
                continue;
            }

            if self.total_tokens.load(Ordering::SeqCst) >= self.config.token_budget {
                // Drop the hash we just inserted so the re-queued copy
                // doesn't get skipped as its own duplicate on the next pass.
                self.seen_hashes.write().remove(&loop_hash);
                self.queue.write().insert(0, activation);
                self.halt_for_budget();
                return;
            }

            let kernel = self.clone();
            tokio::spawn(async move { kernel.run_session(activation).await });
        }
    }

    /// Normal scheduler entry: acquires a permit before running, then
    /// re-drives `process_queue` once it releases it.
    pub async fn run_session(self: &Arc<Self>, activation: Activation) {
        let permit = match self.semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => return,
        };
        self.run_session_body(&activation).await;
        drop(permit);
        if !self.paused.load(Ordering::SeqCst) {
            self.process_queue();
        }
    }

    /// Entry point for a caller that already holds a concurrency permit and
    /// must not acquire a second one, which would deadlock against the one
    /// it's already holding. No built-in tool reaches this today — spawning
    /// a sub-agent enqueues a child activation onto the normal semaphore-
    /// gated queue instead — this exists for a future caller (a harness
    /// composing a fixed pipeline under one permit) that needs a
    /// synchronous child-run result. Mirrors `run_session`'s loop-detection
    /// and budget checks before handing off to the same turn loop, since
    /// bypassing the semaphore is the only difference between the two entry
    /// points. Returns the session's final accumulated text, or a
    /// diagnostic string in place of a real run when one of those checks
    /// fires.
    pub async fn run_session_and_return(self: &Arc<Self>, activation: Activation) -> String {
        let loop_hash = activation.loop_hash();
        let is_duplicate = {
            let mut seen = self.seen_hashes.write();
            if seen.contains(&loop_hash) {
                true
            } else {
                seen.insert(loop_hash);
                false
            }
        };
        if is_duplicate {
            self.deps.events.append(
                NewEvent::new(EventType::Warning, activation.agent_id.clone())
                    .with_activation(activation.id)
                    .with_data(json!({"reason": "duplicate activation skipped (loop detected)"})),
            );
            return format!("Loop detected: '{}' was already run with this input", activation.agent_id);
        }

        if self.total_tokens.load(Ordering::SeqCst) >= self.config.token_budget {
            self.seen_hashes.write().remove(&loop_hash);
            self.halt_for_budget();
            return "Token budget exhausted".to_string();
        }

        self.run_session_body(&activation).await
    }

    async fn run_session_body(self: &Arc<Self>, activation: &Activation) -> String {
        let session_cancel = self.global_cancel.read().child_token();
        let session = Session::open(activation, session_cancel.clone());
        self.sessions.register(session);
        self.deps.events.append(NewEvent::new(EventType::Activation, activation.agent_id.clone()).with_activation(activation.id));
        TraceEvent::SessionOpened { activation_id: activation.id.to_string(), agent_id: activation.agent_id.clone(), spawn_depth: activation.spawn_depth }.emit();

        let Some(profile) = self.deps.agents.get(&activation.agent_id) else {
            self.sessions.mutate(activation.id, |s| s.status = SessionStatus::Error);
            self.deps.events.append(
                NewEvent::new(EventType::Error, activation.agent_id.clone())
                    .with_activation(activation.id)
                    .with_data(json!({"error": format!("missing agent profile: {}", activation.agent_id)})),
            );
            self.finish_session(activation, 0, 0);
            return String::new();
        };

        // Custom tools declare their schema (so the model can see and call
        // them) but have no concrete handler here: `CustomToolDef.handler_ref`
        // is host-opaque, and wiring a real resolver is a host adapter's job.
        let registry = self.deps.tool_registry.clone();
        let custom_names: HashSet<String> = profile.custom_tools.iter().map(|t| t.name.clone()).collect();

        if let Some(registerable) = &self.deps.session_registerable {
            registerable.register_session(&activation.id.to_string(), &activation.agent_id).await;
        }

        let resolved = ok_policy::resolver::resolve(&profile.policy, &activation.input);
        if resolved.escalated {
            self.deps.events.append(
                NewEvent::new(EventType::Warning, activation.agent_id.clone())
                    .with_activation(activation.id)
                    .with_data(json!({"reason": "policy escalated to gloves_off", "trigger": resolved.trigger})),
            );
            TraceEvent::PolicyEscalated { activation_id: activation.id.to_string(), trigger: resolved.trigger.clone().unwrap_or_default() }.emit();
        }

        let sibling_child_count = *self.child_counts.read().get(&activation.agent_id).unwrap_or(&0);
        let local_spawn_count = Arc::new(AtomicU32::new(0));
        let kernel_for_enqueue = self.clone();
        let tool_ctx = ToolContext {
            vfs: self.deps.vfs.clone(),
            working_memory: self.deps.working_memory.clone(),
            task_queue: self.deps.task_queue.clone(),
            events: self.deps.events.clone() as Arc<dyn EventSink>,
            web: self.deps.web.clone(),
            agent_id: activation.agent_id.clone(),
            activation_id: activation.id,
            parent_id: activation.parent_id.clone(),
            spawn_depth: activation.spawn_depth,
            max_depth: self.config.max_depth,
            max_fanout: self.config.max_fanout,
            sibling_child_count,
            local_spawn_count,
            policy: resolved.policy,
            preferred_model: profile.model.clone(),
            enqueue: Arc::new(move |a: Activation| kernel_for_enqueue.enqueue(a)),
        };

        let memory_prefix = match &self.deps.memory_prompt_source {
            Some(source) => source.build_prompt(&activation.agent_id, &activation.input).await.unwrap_or_default(),
            None => String::new(),
        };
        let memory_prefix = if memory_prefix.is_empty() { String::new() } else { format!("{memory_prefix}\n\n") };
        let preamble = self.workspace_preamble();
        let system_prompt = format!("{memory_prefix}{preamble}{}", profile.system_prompt);

        let tool_defs = registry.to_tool_definitions();
        let is_custom = move |name: &str| custom_names.contains(name);

        let mut turns = 0u32;
        let mut nudges_used = 0u32;
        let mut final_text = String::new();

        while turns < self.config.max_agent_turns {
            turns += 1;

            let Some(snapshot) = self.sessions.get(activation.id) else { break };
            if snapshot.status != SessionStatus::Running {
                break;
            }

            let model = self.resolve_model(profile.model.as_deref());
            let chat_ctx = ChatContext { session_id: activation.id.to_string(), system_prompt: system_prompt.clone(), model };

            let turn_result = match run_turn(
                self.deps.provider.as_ref(),
                chat_ctx,
                &snapshot.history,
                &tool_defs,
                &tool_ctx,
                &registry,
                &is_custom,
                &session_cancel,
                &self.paused,
            )
            .await
            {
                Ok(r) => r,
                Err(e) => {
                    self.sessions.mutate(activation.id, |s| s.status = SessionStatus::Error);
                    self.deps.events.append(
                        NewEvent::new(EventType::Error, activation.agent_id.clone())
                            .with_activation(activation.id)
                            .with_data(json!({"error": e.to_string()})),
                    );
                    break;
                }
            };

            let spawned_children = turn_result
                .tool_messages
                .iter()
                .filter(|m| matches!(m, Message::Tool { name, .. } if name == "spawn_agent" && !looks_blocked(result_of(m))))
                .count() as u32;
            if spawned_children > 0 {
                *self.child_counts.write().entry(activation.agent_id.clone()).or_insert(0) += spawned_children;
            }

            self.sessions.mutate(activation.id, |s| {
                for msg in &turn_result.tool_messages {
                    if let Message::Tool { name, call_id, args, result } = msg {
                        s.tool_calls.push(ToolCallRecord {
                            id: call_id.clone(),
                            name: name.clone(),
                            args: args.clone(),
                            result: result.clone(),
                            blocked: looks_blocked(result),
                            timestamp: chrono::Utc::now(),
                        });
                    }
                    s.history.push(msg.clone());
                }
            });

            if turn_result.aborted {
                self.sessions.mutate(activation.id, |s| s.status = SessionStatus::Aborted);
                break;
            }

            if let Some(tc) = turn_result.token_count {
                self.sessions.mutate(activation.id, |s| s.token_count += tc);
                self.total_tokens.fetch_add(tc, Ordering::SeqCst);
            }

            if let Some(err) = turn_result.error {
                self.sessions.mutate(activation.id, |s| s.status = SessionStatus::Error);
                self.deps.events.append(
                    NewEvent::new(EventType::Error, activation.agent_id.clone())
                        .with_activation(activation.id)
                        .with_data(json!({"error": err})),
                );
                if looks_like_quota_error(&err) {
                    self.halt_for_quota(&err);
                }
                break;
            }

            if !turn_result.had_tool_calls {
                if !turn_result.text.is_empty() {
                    self.sessions.mutate(activation.id, |s| s.history.push(Message::model(turn_result.text.clone())));
                }
                final_text = turn_result.text.clone();

                if turns < self.config.min_turns_before_stop && nudges_used < self.config.max_nudges {
                    nudges_used += 1;
                    let nudge = match nudges_used {
                        1 => "Review your progress so far and continue working toward the task.",
                        2 => "You must use one of the available tools to make progress; a text-only reply will not complete this task.",
                        _ => "This is your last chance to make progress before this session ends.",
                    };
                    self.sessions.mutate(activation.id, |s| s.history.push(Message::user(nudge)));
                    continue;
                }
                break;
            }

            if !self.wrap_up_injected.load(Ordering::SeqCst)
                && self.config.wrap_up_threshold > 0.0
                && self.total_tokens.load(Ordering::SeqCst) as f64 >= self.config.token_budget as f64 * self.config.wrap_up_threshold
            {
                self.wrap_up_injected.store(true, Ordering::SeqCst);
                self.sessions.mutate(activation.id, |s| {
                    s.history.push(Message::user(
                        "You are approaching the token budget for this run. Wrap up your current task and provide a final summary.",
                    ))
                });
            }
        }

        if self.config.auto_record_failures {
            self.auto_record_failures(activation);
        }

        if self.config.force_reflection {
            if let Some(snapshot) = self.sessions.get(activation.id) {
                if snapshot.status == SessionStatus::Running {
                    self.run_reflection_turn(activation, &system_prompt, &tool_defs, &tool_ctx, &registry, &is_custom, &session_cancel).await;
                }
            }
        }

        if let Some(snapshot) = self.sessions.get(activation.id) {
            if snapshot.status == SessionStatus::Running {
                self.sessions.mutate(activation.id, |s| s.status = SessionStatus::Completed);
            }
        }

        let token_count = self.sessions.get(activation.id).map(|s| s.token_count).unwrap_or(0);
        self.finish_session(activation, token_count, turns);
        final_text
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_reflection_turn(
        self: &Arc<Self>,
        activation: &Activation,
        system_prompt: &str,
        tool_defs: &[ok_domain::tool::ToolDefinition],
        tool_ctx: &ToolContext,
        registry: &ToolRegistry,
        is_custom: &impl Fn(&str) -> bool,
        session_cancel: &CancellationToken,
    ) {
        self.sessions.mutate(activation.id, |s| {
            s.history.push(Message::user(
                "Before finishing, briefly reflect: what did you accomplish, and is anything left incomplete?",
            ))
        });
        let Some(snapshot) = self.sessions.get(activation.id) else { return };
        let model = self.resolve_model(None);
        let chat_ctx = ChatContext { session_id: activation.id.to_string(), system_prompt: system_prompt.to_string(), model };
        // Reflection errors are swallowed: a failed reflection turn must
        // never fail the session.
        if let Ok(result) = run_turn(self.deps.provider.as_ref(), chat_ctx, &snapshot.history, tool_defs, tool_ctx, registry, is_custom, session_cancel, &self.paused).await {
            if !result.text.is_empty() {
                self.sessions.mutate(activation.id, |s| s.history.push(Message::model(result.text)));
            }
        }
    }

    fn auto_record_failures(&self, activation: &Activation) {
        let Some(memory) = &self.deps.working_memory else { return };
        let Some(session) = self.sessions.get(activation.id) else { return };
        let failures: Vec<&ToolCallRecord> = session.tool_calls.iter().filter(|t| looks_like_failure(&t.result)).collect();
        if failures.is_empty() {
            return;
        }
        let summary = failures.iter().map(|t| format!("{}: {}", t.name, truncate(&t.result, 200))).collect::<Vec<_>>().join("; ");
        memory.write(NewEntry {
            key: format!("tool-failures-{}", activation.id),
            value: summary,
            tags: vec!["mistake".to_string(), "tool-failure".to_string(), "auto-detected".to_string()],
            author: activation.agent_id.clone(),
        });
    }

    fn finish_session(self: &Arc<Self>, activation: &Activation, token_count: u64, turns: u32) {
        let status = self.sessions.get(activation.id).map(|s| s.status).unwrap_or(SessionStatus::Error);
        self.deps.events.append(
            NewEvent::new(EventType::Complete, activation.agent_id.clone())
                .with_activation(activation.id)
                .with_data(json!({"status": format!("{status:?}"), "tokens": token_count})),
        );
        TraceEvent::SessionClosed {
            activation_id: activation.id.to_string(),
            status: format!("{status:?}"),
            turns,
            tokens: token_count,
        }
        .emit();
        self.sessions.close(activation.id);
        let provider = self.deps.provider.clone();
        let session_id = activation.id.to_string();
        tokio::spawn(async move { provider.end_session(&session_id).await });
    }

    fn resolve_model(&self, profile_model: Option<&str>) -> String {
        let is_legacy = |m: &str| m.eq_ignore_ascii_case("legacy");
        if let Some(m) = &self.config.model {
            if !is_legacy(m) {
                return m.clone();
            }
        }
        if let Some(m) = profile_model {
            if !is_legacy(m) {
                return m.to_string();
            }
        }
        DEFAULT_MODEL.to_string()
    }

    fn workspace_preamble(&self) -> String {
        let prefixes = self.deps.vfs.get_existing_prefixes();
        if prefixes.is_empty() {
            String::new()
        } else {
            format!("You are operating in a shared workspace. Existing top-level areas: {}.\n\n", prefixes.join(", "))
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(self: &Arc<Self>) {
        self.paused.store(false, Ordering::SeqCst);
        self.process_queue();
    }

    pub fn kill_all(self: &Arc<Self>) {
        self.global_cancel.read().cancel();
        self.queue.write().clear();
        self.quota_halt_triggered.store(false, Ordering::SeqCst);
        self.budget_halt_triggered.store(false, Ordering::SeqCst);
        self.wrap_up_injected.store(false, Ordering::SeqCst);
        *self.global_cancel.write() = CancellationToken::new();
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn kill_session(&self, activation_id: ActId) {
        if let Some(session) = self.sessions.get(activation_id) {
            session.cancel.cancel();
        }
    }

    pub fn halt_for_budget(self: &Arc<Self>) {
        if self.budget_halt_triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        self.paused.store(true, Ordering::SeqCst);
        self.abort_other_sessions(None);
        self.deps.events.append(
            NewEvent::new(EventType::Warning, "kernel".to_string())
                .with_data(json!({"reason": "token budget exceeded", "total_tokens": self.total_tokens()})),
        );
        TraceEvent::BudgetHalt { total_tokens: self.total_tokens(), budget: self.config.token_budget }.emit();
    }

    pub fn halt_for_quota(self: &Arc<Self>, reason: &str) {
        if self.quota_halt_triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        self.paused.store(true, Ordering::SeqCst);
        self.abort_other_sessions(None);
        self.deps
            .events
            .append(NewEvent::new(EventType::Warning, "kernel".to_string()).with_data(json!({"reason": reason})));
        TraceEvent::QuotaHalt { reason: reason.to_string() }.emit();
    }

    fn abort_other_sessions(&self, keep: Option<ActId>) {
        for session in self.sessions.active() {
            if Some(session.activation_id) != keep {
                session.cancel.cancel();
            }
        }
    }

    /// Drains the queue to completion: if memory is enabled, opens a run
    /// id before draining and snapshots working memory into
    /// `working_memory_snapshot` once every session has settled.
    pub async fn run_until_empty(self: &Arc<Self>) {
        if self.config.memory_enabled {
            if let Some(memory) = &self.deps.working_memory {
                memory.init_run(uuid::Uuid::new_v4().to_string());
            }
        }

        self.process_queue();
        loop {
            let no_active = self.sessions.active_count() == 0;
            let queue_empty = self.queue.read().is_empty();
            if no_active && (queue_empty || self.paused.load(Ordering::SeqCst)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        if self.config.memory_enabled {
            if let Some(memory) = &self.deps.working_memory {
                let snapshot = memory.end_run();
                *self.working_memory_snapshot.write() = Some(snapshot);
            }
        }
    }
}

fn result_of(message: &Message) -> &str {
    match message {
        Message::Tool { result, .. } => result,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ok_domain::activation::Activation;
    use ok_domain::agent::AgentProfile;
    use ok_domain::policy::Policy;
    use ok_providers::{ScriptedProvider, ScriptedTurn};
    use ok_tools::{builtin_registry, StaticWebAccess};

    fn profile(path: &str, prompt: &str) -> AgentProfile {
        AgentProfile {
            id: path.to_string(),
            path: path.to_string(),
            name: path.to_string(),
            model: None,
            system_prompt: prompt.to_string(),
            custom_tools: vec![],
            policy: Policy::balanced(),
        }
    }

    fn test_deps(provider: Arc<ScriptedProvider>) -> KernelDeps {
        let agents = AgentRegistry::new();
        agents.register(profile("agents/writer.md", "You write things."));
        let session_registerable: Arc<dyn SessionRegisterable> = provider.clone();
        KernelDeps {
            provider,
            agents,
            vfs: Vfs::new(),
            events: EventLog::new(),
            working_memory: Some(Arc::new(WorkingMemory::new())),
            memory_prompt_source: None,
            task_queue: None,
            web: Arc::new(StaticWebAccess { search_result: String::new(), fetch_result: String::new() }),
            tool_registry: builtin_registry(),
            session_registerable: Some(session_registerable),
        }
    }

    #[tokio::test]
    async fn single_agent_completes_with_no_tool_calls() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.script("agents/writer.md", vec![ScriptedTurn::text_then_done("done", 5)]);
        let kernel = Kernel::new(KernelConfig::default(), test_deps(provider));

        let activation = Activation::root("agents/writer.md", "write a haiku");
        let id = activation.id;
        kernel.enqueue(activation);
        kernel.run_until_empty().await;

        let session = kernel.sessions().completed().into_iter().find(|s| s.activation_id == id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(kernel.total_tokens(), 5);
    }

    #[tokio::test]
    async fn missing_agent_profile_errors_the_session() {
        let provider = Arc::new(ScriptedProvider::default());
        let kernel = Kernel::new(KernelConfig::default(), test_deps(provider));

        let activation = Activation::root("agents/ghost.md", "do something");
        let id = activation.id;
        kernel.enqueue(activation);
        kernel.run_until_empty().await;

        let session = kernel.sessions().completed().into_iter().find(|s| s.activation_id == id).unwrap();
        assert_eq!(session.status, SessionStatus::Error);
    }

    #[tokio::test]
    async fn duplicate_activation_is_skipped_as_a_loop() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.script("agents/writer.md", vec![ScriptedTurn::text_then_done("done", 1)]);
        let kernel = Kernel::new(KernelConfig::default(), test_deps(provider));

        let a1 = Activation::root("agents/writer.md", "write a haiku");
        let a2 = Activation::root("agents/writer.md", "write a haiku");
        kernel.enqueue(a1);
        kernel.enqueue(a2);
        kernel.run_until_empty().await;

        assert_eq!(kernel.sessions().completed().len(), 1);
    }

    #[tokio::test]
    async fn budget_halt_requeue_does_not_loop_detect() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.script("agents/writer.md", vec![ScriptedTurn::text_then_done("done", 1)]);
        let mut config = KernelConfig::default();
        config.token_budget = 0;
        let kernel = Kernel::new(config, test_deps(provider));

        let activation = Activation::root("agents/writer.md", "write a haiku");
        kernel.enqueue(activation);

        // The budget halt immediately pauses the kernel and re-queues the
        // activation; resuming must let it run rather than silently
        // dropping it as a duplicate of itself.
        assert_eq!(kernel.queue_len(), 1);
        assert!(kernel.is_paused());

        kernel.resume();
        kernel.config_for_test_only_unpause_budget();
        kernel.run_until_empty().await;
        assert_eq!(kernel.sessions().completed().len(), 1);
    }

    impl Kernel {
        /// Test seam: the real system clears a budget halt by raising the
        /// budget out-of-band (an operator action); this stands in for
        /// that without adding a public budget-mutation API.
        fn config_for_test_only_unpause_budget(self: &Arc<Self>) {
            self.budget_halt_triggered.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn pause_then_resume_allows_queued_work_to_proceed() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.script("agents/writer.md", vec![ScriptedTurn::text_then_done("done", 1)]);
        let kernel = Kernel::new(KernelConfig::default(), test_deps(provider));
        kernel.pause();

        let activation = Activation::root("agents/writer.md", "write a haiku");
        kernel.enqueue(activation);
        assert_eq!(kernel.queue_len(), 1);

        kernel.resume();
        kernel.run_until_empty().await;
        assert_eq!(kernel.sessions().completed().len(), 1);
    }
}
