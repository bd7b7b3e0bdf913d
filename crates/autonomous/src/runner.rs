use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use ok_core::kernel::{Kernel, KernelDeps};
use ok_core::summarizer::{apply_outcome, ConsolidateFn, ExtractedMemory, Summarizer, SummarizeFn};
use ok_domain::activation::Activation;
use ok_domain::config::KernelConfig;
use ok_domain::stream::StreamChunk;
use ok_domain::tool::ToolDefinition;
use ok_domain::Result;
use ok_providers::{AIProvider, ChatContext, EmbeddingEngine};
use parking_lot::RwLock;

const SUMMARIZER_SYSTEM_PROMPT: &str = "You extract durable memories from a completed agent run. \
Respond with a JSON array of objects shaped like {\"type\":\"fact|procedure|observation|mistake|preference|skill\",\"content\":\"...\",\"tags\":[\"...\"]}. \
Respond with only the JSON array, nothing else.";

const CONSOLIDATE_SYSTEM_PROMPT: &str = "You consolidate candidate memories against existing long-term memory. \
Respond with a JSON object {\"operations\":[...]} where each operation is one of \
{\"op\":\"keep\"}, {\"op\":\"update\",\"id\":\"...\",\"content\":\"...\",\"tags\":[...]}, \
{\"op\":\"delete\",\"id\":\"...\"}, {\"op\":\"add\",\"type\":\"...\",\"content\":\"...\",\"tags\":[...]}, \
{\"op\":\"skip\",\"index\":0}. Respond with only the JSON object, nothing else.";

/// Static configuration for one autonomous mission, per `spec.md` §4.11.
pub struct AutonomousConfig {
    pub max_cycles: u32,
    pub wrap_up_threshold: f64,
    pub agent_path: String,
    pub mission_prompt: String,
    pub kernel_config: KernelConfig,
}

/// Everything shared across every cycle of one mission. A fresh `Kernel` is
/// built from these plus a per-cycle `KernelConfig` on each iteration — the
/// kernel itself owns no cross-cycle state other than what lives behind
/// these handles (its `SessionStore` is rebuilt fresh every cycle, which is
/// exactly the "clear session store, retain VFS and task queue" step
/// `spec.md` §4.11 calls for).
pub struct AutonomousDeps {
    pub provider: Arc<dyn AIProvider>,
    pub agents: Arc<ok_core::agent_registry::AgentRegistry>,
    pub vfs: Arc<ok_vfs::Vfs>,
    pub events: Arc<ok_core::eventlog::EventLog>,
    pub working_memory: Arc<ok_memory::WorkingMemory>,
    pub memory_prompt_source: Option<Arc<dyn ok_memory::MemoryPromptSource>>,
    pub task_queue: Arc<ok_tools::TaskQueueStore>,
    pub web: Arc<dyn ok_tools::WebAccess>,
    pub tool_registry: ok_tools::ToolRegistry,
    pub session_registerable: Option<Arc<dyn ok_providers::SessionRegisterable>>,
}

/// Progress emitted once per cycle boundary; a host UI or CLI subscribes to
/// these to render mission status without reaching into the runner's
/// internals.
#[derive(Debug, Clone)]
pub enum CycleEvent {
    Started { cycle: u32 },
    Completed { cycle: u32, tokens: u64 },
    Stopped { at_cycle: u32 },
}

/// Drives `spec.md` §4.11's cycle loop: repeatedly build cycle input,
/// construct a fresh `Kernel`, run it to completion, accumulate tokens, and
/// best-effort summarize into long-term memory before the next cycle.
pub struct AutonomousRunner<E: EmbeddingEngine + 'static> {
    config: AutonomousConfig,
    deps: AutonomousDeps,
    ltm: Option<Arc<ok_memory::LongTermMemory<E>>>,
    current_kernel: RwLock<Option<Arc<Kernel>>>,
    total_tokens_all_cycles: AtomicU64,
    stopped: AtomicBool,
    listeners: parking_lot::Mutex<Vec<Box<dyn Fn(CycleEvent) + Send + Sync>>>,
}

impl<E: EmbeddingEngine + 'static> AutonomousRunner<E> {
    pub fn new(config: AutonomousConfig, deps: AutonomousDeps, ltm: Option<Arc<ok_memory::LongTermMemory<E>>>) -> Self {
        Self {
            config,
            deps,
            ltm,
            current_kernel: RwLock::new(None),
            total_tokens_all_cycles: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            listeners: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn on_event(&self, listener: impl Fn(CycleEvent) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    fn emit(&self, event: CycleEvent) {
        for listener in self.listeners.lock().iter() {
            listener(event.clone());
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens_all_cycles.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(kernel) = self.current_kernel.read().as_ref() {
            kernel.kill_all();
        }
    }

    pub fn pause(&self) {
        if let Some(kernel) = self.current_kernel.read().as_ref() {
            kernel.pause();
        }
    }

    pub fn resume(&self) {
        if let Some(kernel) = self.current_kernel.read().as_ref() {
            kernel.resume();
        }
    }

    /// Runs every cycle up to `max_cycles`, stopping early if `stop()` is
    /// called from another task (e.g. a host UI's cancel button).
    pub async fn run(&self) {
        self.deps.task_queue.clear();

        for cycle in 1..=self.config.max_cycles {
            if self.stopped.load(Ordering::SeqCst) {
                self.emit(CycleEvent::Stopped { at_cycle: cycle });
                break;
            }
            self.emit(CycleEvent::Started { cycle });

            let input = self.build_cycle_input(cycle);

            let mut cycle_config = self.config.kernel_config.clone();
            cycle_config.wrap_up_threshold = self.config.wrap_up_threshold;

            let kernel = Kernel::new(
                cycle_config,
                KernelDeps {
                    provider: self.deps.provider.clone(),
                    agents: self.deps.agents.clone(),
                    vfs: self.deps.vfs.clone(),
                    events: self.deps.events.clone(),
                    working_memory: Some(self.deps.working_memory.clone()),
                    memory_prompt_source: self.deps.memory_prompt_source.clone(),
                    task_queue: Some(self.deps.task_queue.clone()),
                    web: self.deps.web.clone(),
                    tool_registry: self.deps.tool_registry.clone(),
                    session_registerable: self.deps.session_registerable.clone(),
                },
            );
            *self.current_kernel.write() = Some(kernel.clone());

            kernel.enqueue(Activation::root(self.config.agent_path.clone(), input));
            kernel.run_until_empty().await;

            let cycle_tokens = kernel.total_tokens();
            self.total_tokens_all_cycles.fetch_add(cycle_tokens, Ordering::SeqCst);
            self.emit(CycleEvent::Completed { cycle, tokens: cycle_tokens });

            self.summarize_cycle(&kernel).await;
        }
    }

    fn build_cycle_input(&self, cycle: u32) -> String {
        let mut input = format!("{}\n\nCycle {} of {}.\n", self.config.mission_prompt, cycle, self.config.max_cycles);
        if cycle > 1 {
            input.push_str("\nThis continues a prior cycle's work. Review the task queue and VFS before starting new work.\n");
        }

        let pending = self.deps.task_queue.pending();
        if pending.is_empty() {
            input.push_str("\nTask queue is empty.\n");
        } else {
            input.push_str("\n## Task Queue\n\n");
            for task in &pending {
                input.push_str(&format!("- [{}] {}\n", task.id, task.description));
            }
        }
        input.push_str(
            "\nUse task_queue_read/task_queue_write to track multi-step work across cycles. \
Mark a task done once you finish it so the next cycle does not repeat it.\n",
        );
        input
    }

    async fn summarize_cycle(&self, kernel: &Arc<Kernel>) {
        let Some(ltm) = &self.ltm else { return };
        if !self.config.kernel_config.memory_enabled {
            return;
        }

        let Some(snapshot) = kernel.working_memory_snapshot() else { return };
        let sessions = kernel.sessions().completed();
        if sessions.is_empty() {
            return;
        }

        let existing = ltm.all();
        let summarize = self.build_summarize_fn();
        let consolidate = self.build_consolidate_fn();
        let summarizer = Summarizer::new(self.deps.vfs.clone(), summarize, Some(consolidate));

        let outcome = summarizer.summarize_run(&snapshot.entries, &sessions, existing).await;
        apply_outcome(ltm.as_ref(), outcome).await;
    }

    fn build_summarize_fn(&self) -> SummarizeFn {
        let provider = self.deps.provider.clone();
        Box::new(move |context| {
            let provider = provider.clone();
            Box::pin(async move {
                let text = run_single_turn(&provider, SUMMARIZER_SYSTEM_PROMPT, &context).await?;
                serde_json::from_str::<Vec<ExtractedMemory>>(text.trim())
                    .map_err(|e| ok_domain::Error::Other(format!("summarize response was not valid JSON: {e}")))
            })
        })
    }

    fn build_consolidate_fn(&self) -> ConsolidateFn {
        let provider = self.deps.provider.clone();
        Box::new(move |prompt| {
            let provider = provider.clone();
            Box::pin(async move {
                let text = run_single_turn(&provider, CONSOLIDATE_SYSTEM_PROMPT, &prompt).await?;
                serde_json::from_str(text.trim())
                    .map_err(|e| ok_domain::Error::Other(format!("consolidate response was not valid JSON: {e}")))
            })
        })
    }
}

/// One-shot, toolless provider exchange: used by the summarizer's
/// `summarizeFn`/`consolidateFn`, which need a single text response rather
/// than a full turn loop with tool dispatch.
async fn run_single_turn(provider: &Arc<dyn AIProvider>, system_prompt: &str, user_message: &str) -> Result<String> {
    let ctx = ChatContext { session_id: uuid::Uuid::new_v4().to_string(), system_prompt: system_prompt.to_string(), model: ok_domain::config::DEFAULT_MODEL.to_string() };
    let history = vec![ok_domain::tool::Message::user(user_message)];
    let tools: &[ToolDefinition] = &[];

    let mut stream = provider.chat(ctx, &history, tools).await?;
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Text { text: t } => text.push_str(&t),
            StreamChunk::Done { .. } => break,
            StreamChunk::Error { error } => return Err(ok_domain::Error::ProviderStream(error)),
            StreamChunk::ToolCall { .. } => {}
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ok_domain::agent::AgentProfile;
    use ok_domain::policy::Policy;
    use ok_providers::{HashEmbeddingEngine, ScriptedProvider, ScriptedTurn};
    use ok_tools::StaticWebAccess;

    fn deps_with_provider(provider: Arc<ScriptedProvider>) -> AutonomousDeps {
        let agents = ok_core::agent_registry::AgentRegistry::new();
        agents.register(AgentProfile {
            id: "agents/runner.md".into(),
            path: "agents/runner.md".into(),
            name: "runner".into(),
            model: None,
            system_prompt: "run the mission".into(),
            custom_tools: vec![],
            policy: Policy::balanced(),
        });
        let registerable: Arc<dyn ok_providers::SessionRegisterable> = provider.clone();
        AutonomousDeps {
            provider: provider as Arc<dyn AIProvider>,
            agents,
            vfs: ok_vfs::Vfs::new(),
            events: ok_core::eventlog::EventLog::new(),
            working_memory: Arc::new(ok_memory::WorkingMemory::new()),
            memory_prompt_source: None,
            task_queue: Arc::new(ok_tools::TaskQueueStore::new()),
            web: Arc::new(StaticWebAccess { search_result: String::new(), fetch_result: String::new() }) as Arc<dyn ok_tools::WebAccess>,
            tool_registry: ok_tools::builtin_registry(),
            session_registerable: Some(registerable),
        }
    }

    #[tokio::test]
    async fn runs_configured_number_of_cycles_and_accumulates_tokens() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.script("agents/runner.md", vec![ScriptedTurn::text_then_done("ok", 5)]);

        let deps = deps_with_provider(provider);
        let config = AutonomousConfig {
            max_cycles: 2,
            wrap_up_threshold: 1.0,
            agent_path: "agents/runner.md".into(),
            mission_prompt: "ship the feature".into(),
            kernel_config: KernelConfig { memory_enabled: false, ..Default::default() },
        };
        let runner: AutonomousRunner<HashEmbeddingEngine> = AutonomousRunner::new(config, deps, None);

        runner.run().await;
        assert_eq!(runner.total_tokens(), 10);
    }

    #[tokio::test]
    async fn stop_before_first_cycle_prevents_any_run() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.script("agents/runner.md", vec![ScriptedTurn::text_then_done("ok", 5)]);

        let deps = deps_with_provider(provider);
        let config = AutonomousConfig {
            max_cycles: 3,
            wrap_up_threshold: 1.0,
            agent_path: "agents/runner.md".into(),
            mission_prompt: "ship the feature".into(),
            kernel_config: KernelConfig { memory_enabled: false, ..Default::default() },
        };
        let runner: AutonomousRunner<HashEmbeddingEngine> = AutonomousRunner::new(config, deps, None);
        runner.stop();

        runner.run().await;
        assert_eq!(runner.total_tokens(), 0);
    }

    #[tokio::test]
    async fn cycle_input_lists_pending_tasks() {
        let provider = Arc::new(ScriptedProvider::default());
        let deps = deps_with_provider(provider);
        deps.task_queue.add("write the report", "agents/runner.md");

        let config = AutonomousConfig {
            max_cycles: 1,
            wrap_up_threshold: 1.0,
            agent_path: "agents/runner.md".into(),
            mission_prompt: "ship the feature".into(),
            kernel_config: KernelConfig::default(),
        };
        let runner: AutonomousRunner<HashEmbeddingEngine> = AutonomousRunner::new(config, deps, None);
        let input = runner.build_cycle_input(1);
        assert!(input.contains("write the report"));
    }
}
