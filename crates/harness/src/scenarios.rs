//! End-to-end demo scenarios, runnable from the command line against
//! `ok_providers::ScriptedProvider` stand-ins for a real model. Each
//! scenario builds its own `Kernel` from scratch and asserts the
//! behavior it demonstrates; a failed assertion surfaces as an `Err`
//! with the offending detail rather than a panic, so the CLI can report
//! it and exit non-zero without a backtrace.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use ok_core::agent_registry::AgentRegistry;
use ok_core::eventlog::EventLog;
use ok_core::kernel::{Kernel, KernelDeps};
use ok_domain::activation::Activation;
use ok_domain::agent::AgentProfile;
use ok_domain::config::KernelConfig;
use ok_domain::events::EventType;
use ok_domain::policy::Policy;
use ok_memory::WorkingMemory;
use ok_providers::{ScriptedProvider, ScriptedTurn};
use ok_sessions::SessionStatus;
use ok_tools::{builtin_registry, StaticWebAccess, TaskQueueStore};
use ok_vfs::Vfs;
use serde_json::json;

/// Every scenario this harness knows how to run, in presentation order.
pub const ALL: &[&str] = &["s1", "s2", "s3", "s4", "s5", "s6"];

pub struct ScenarioReport {
    pub name: &'static str,
    pub detail: String,
}

pub async fn run(name: &str) -> Result<ScenarioReport> {
    match name {
        "s1" => s1_single_agent_completes().await,
        "s2" => s2_concurrency_bound().await,
        "s3" => s3_spawn_writes_child_profile().await,
        "s4" => s4_quota_halt().await,
        "s5" => s5_loop_detection().await,
        "s6" => s6_demo_project().await,
        other => bail!("unknown scenario '{other}', expected one of {ALL:?}"),
    }
}

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

fn base_deps(provider: Arc<ScriptedProvider>, agents: Arc<AgentRegistry>, vfs: Arc<Vfs>, events: Arc<EventLog>) -> KernelDeps {
    let registerable: Arc<dyn ok_providers::SessionRegisterable> = provider.clone();
    KernelDeps {
        provider: provider as Arc<dyn ok_providers::AIProvider>,
        agents,
        vfs,
        events,
        working_memory: Some(Arc::new(WorkingMemory::new())),
        memory_prompt_source: None,
        task_queue: Some(Arc::new(TaskQueueStore::new())),
        web: Arc::new(StaticWebAccess { search_result: String::new(), fetch_result: String::new() }),
        tool_registry: builtin_registry(),
        session_registerable: Some(registerable),
    }
}

/// S1 — a single agent that answers without calling any tools.
async fn s1_single_agent_completes() -> Result<ScenarioReport> {
    let provider = Arc::new(ScriptedProvider::default());
    provider.script("agents/writer.md", vec![ScriptedTurn::text_then_done("hi", 10)]);

    let agents = AgentRegistry::new();
    agents.register(profile("agents/writer.md", "You write things."));
    let vfs = Vfs::new();
    let events = EventLog::with_vfs(vfs.clone());
    let kernel = Kernel::new(KernelConfig::default(), base_deps(provider, agents, vfs, events));

    let activation = Activation::root("agents/writer.md", "write");
    kernel.enqueue(activation);
    kernel.run_until_empty().await;

    let completed = kernel.sessions().completed();
    if completed.len() != 1 {
        bail!("expected 1 completed session, got {}", completed.len());
    }
    let session = &completed[0];
    if session.status != SessionStatus::Completed {
        bail!("expected status Completed, got {:?}", session.status);
    }
    if kernel.total_tokens() != 10 {
        bail!("expected totalTokens == 10, got {}", kernel.total_tokens());
    }
    if session.history.len() != 2 || session.history[0].text() != "write" || session.history[1].text() != "hi" {
        bail!("unexpected history: {:?}", session.history.iter().map(|m| m.text()).collect::<Vec<_>>());
    }

    Ok(ScenarioReport { name: "s1", detail: "single agent completed with the scripted response".into() })
}

/// S2 — two activations under `maxConcurrency=1` never overlap, and the
/// lower-priority one completes first.
async fn s2_concurrency_bound() -> Result<ScenarioReport> {
    let provider = Arc::new(ScriptedProvider::default());
    provider.script(
        "agents/writer.md",
        vec![ScriptedTurn::text_then_done("first", 1), ScriptedTurn::text_then_done("second", 1)],
    );

    let agents = AgentRegistry::new();
    agents.register(profile("agents/writer.md", "You write things."));
    let vfs = Vfs::new();
    let events = EventLog::with_vfs(vfs.clone());
    let mut config = KernelConfig::default();
    config.max_concurrency = 1;
    let kernel = Kernel::new(config, base_deps(provider, agents, vfs, events.clone()));

    let a1 = Activation::root("agents/writer.md", "draft one");
    let a2 = Activation::root("agents/writer.md", "draft two");
    let id1 = a1.id;
    let id2 = a2.id;
    kernel.enqueue(a1);
    kernel.enqueue(a2);
    kernel.run_until_empty().await;

    let completed = kernel.sessions().completed();
    if completed.len() != 2 {
        bail!("expected 2 completed sessions, got {}", completed.len());
    }
    let order: Vec<_> = completed.iter().map(|s| s.activation_id).collect();
    if order != vec![id1, id2] {
        bail!("expected sessions to complete in enqueue order, got {order:?}");
    }

    let mut in_flight = 0i32;
    let mut max_in_flight = 0i32;
    for entry in events.entries() {
        match entry.event_type {
            EventType::Activation => in_flight += 1,
            EventType::Complete => in_flight -= 1,
            _ => continue,
        }
        max_in_flight = max_in_flight.max(in_flight);
    }
    if max_in_flight > 1 {
        bail!("observed {max_in_flight} concurrent activations with maxConcurrency=1");
    }

    Ok(ScenarioReport { name: "s2", detail: "two activations serialized under maxConcurrency=1, completed in priority order".into() })
}

/// S3 — spawning a child agent enqueues it and the parent's write lands
/// in the shared workspace before the child ever reads it.
async fn s3_spawn_writes_child_profile() -> Result<ScenarioReport> {
    let provider = Arc::new(ScriptedProvider::default());
    provider.script(
        "agents/lead.md",
        vec![
            ScriptedTurn::tool_call_then_done(
                "call-1",
                "vfs_write",
                json!({"path": "agents/child.md", "content": "---\nname: \"Child\"\n---"}),
            ),
            ScriptedTurn::tool_call_then_done("call-2", "spawn_agent", json!({"agent_path": "agents/child.md", "task": "do"})),
            ScriptedTurn::text_then_done("spawned the child", 2),
        ],
    );
    provider.script("agents/child.md", vec![ScriptedTurn::text_then_done("child done", 1)]);

    let agents = AgentRegistry::new();
    agents.register(profile("agents/lead.md", "You lead a small team."));
    agents.register(profile("agents/child.md", "You do as told."));
    let vfs = Vfs::new();
    let events = EventLog::with_vfs(vfs.clone());
    let kernel = Kernel::new(KernelConfig::default(), base_deps(provider, agents, vfs.clone(), events));

    kernel.enqueue(Activation::root("agents/lead.md", "lead the work"));
    kernel.run_until_empty().await;

    if !vfs.exists("agents/child.md") {
        bail!("expected agents/child.md to exist in the workspace");
    }
    if kernel.sessions().completed().len() != 2 {
        bail!("expected 2 completed sessions, got {}", kernel.sessions().completed().len());
    }

    Ok(ScenarioReport { name: "s3", detail: "lead spawned a child and its profile landed in the VFS".into() })
}

/// S4 — a 429-shaped provider error halts the kernel and leaves anything
/// still queued untouched.
async fn s4_quota_halt() -> Result<ScenarioReport> {
    let provider = Arc::new(ScriptedProvider::default());
    provider.script("agents/writer.md", vec![ScriptedTurn::error("429 RESOURCE_EXHAUSTED")]);

    let agents = AgentRegistry::new();
    agents.register(profile("agents/writer.md", "You write things."));
    let vfs = Vfs::new();
    let events = EventLog::with_vfs(vfs.clone());
    let mut config = KernelConfig::default();
    config.max_concurrency = 1;
    let kernel = Kernel::new(config, base_deps(provider, agents, vfs, events));

    // Run the first activation directly so its failure (and the resulting
    // pause) is observed deterministically before the second is queued,
    // rather than racing two `enqueue` calls against the scheduler.
    kernel.run_session(Activation::root("agents/writer.md", "draft one")).await;
    if !kernel.is_paused() {
        bail!("expected kernel to be paused after a quota error");
    }
    let completed = kernel.sessions().completed();
    if completed.len() != 1 || completed[0].status != SessionStatus::Error {
        bail!("expected the first session to be Error, got {:?}", completed.iter().map(|s| s.status).collect::<Vec<_>>());
    }

    kernel.enqueue(Activation::root("agents/writer.md", "draft two"));
    if kernel.queue_len() != 1 {
        bail!("expected the second activation to remain queued, queueLength == {}", kernel.queue_len());
    }

    Ok(ScenarioReport { name: "s4", detail: "quota error paused the kernel and left the next activation queued".into() })
}

/// S5 — `run_session_and_return` called twice with identical input treats
/// the second call as a loop and refuses to run it again.
async fn s5_loop_detection() -> Result<ScenarioReport> {
    let provider = Arc::new(ScriptedProvider::default());
    provider.script("agents/writer.md", vec![ScriptedTurn::text_then_done("the model's answer", 3)]);

    let agents = AgentRegistry::new();
    agents.register(profile("agents/writer.md", "You write things."));
    let vfs = Vfs::new();
    let events = EventLog::with_vfs(vfs.clone());
    let kernel = Kernel::new(KernelConfig::default(), base_deps(provider, agents, vfs, events));

    let first = kernel.run_session_and_return(Activation::root("agents/writer.md", "write the same thing")).await;
    if first != "the model's answer" {
        bail!("expected the first call to return the model's text, got {first:?}");
    }

    let second = kernel.run_session_and_return(Activation::root("agents/writer.md", "write the same thing")).await;
    if !second.contains("Loop detected") {
        bail!("expected the second call to report loop detection, got {second:?}");
    }

    Ok(ScenarioReport { name: "s5", detail: "repeating an identical activation was refused as a loop".into() })
}

/// S6 — a six-agent project: a lead spawns five specialists, each of
/// which contributes an artifact and signals back before the lead closes
/// out with a summary.
async fn s6_demo_project() -> Result<ScenarioReport> {
    let provider = Arc::new(ScriptedProvider::default());

    provider.script(
        "agents/lead.md",
        vec![
            ScriptedTurn::tool_call_then_done("c1", "spawn_agent", json!({"agent_path": "agents/researcher.md", "task": "research the product space"})),
            ScriptedTurn::tool_call_then_done("c2", "spawn_agent", json!({"agent_path": "agents/designer.md", "task": "write the design spec"})),
            ScriptedTurn::tool_call_then_done("c3", "spawn_agent", json!({"agent_path": "agents/html-dev.md", "task": "build the page"})),
            ScriptedTurn::tool_call_then_done("c4", "spawn_agent", json!({"agent_path": "agents/css-dev.md", "task": "style the page"})),
            ScriptedTurn::tool_call_then_done("c5", "spawn_agent", json!({"agent_path": "agents/qa-reviewer.md", "task": "review the site"})),
            ScriptedTurn::text_then_done("team kicked off", 2),
            ScriptedTurn::text_then_done("acknowledged", 1),
            ScriptedTurn::text_then_done("acknowledged", 1),
            ScriptedTurn::text_then_done("acknowledged", 1),
            ScriptedTurn::text_then_done("acknowledged", 1),
            ScriptedTurn::tool_call_then_done(
                "c6",
                "vfs_write",
                json!({"path": "artifacts/summary.md", "content": "# Summary\n\nThe site shipped and passed review."}),
            ),
            ScriptedTurn::text_then_done("wrapped up the project", 2),
        ],
    );
    provider.script(
        "agents/researcher.md",
        vec![
            ScriptedTurn::tool_call_then_done("r1", "vfs_write", json!({"path": "artifacts/research-notes.md", "content": "# Research\n\nUsers want a fast static page."})),
            ScriptedTurn::tool_call_then_done("r2", "signal_parent", json!({"message": "research complete"})),
            ScriptedTurn::text_then_done("done researching", 1),
        ],
    );
    provider.script(
        "agents/designer.md",
        vec![
            ScriptedTurn::tool_call_then_done("d1", "vfs_write", json!({"path": "artifacts/design-spec.md", "content": "# Design Spec\n\nSingle-page layout, light theme."})),
            ScriptedTurn::tool_call_then_done("d2", "signal_parent", json!({"message": "design complete"})),
            ScriptedTurn::text_then_done("done designing", 1),
        ],
    );
    provider.script(
        "agents/html-dev.md",
        vec![
            ScriptedTurn::tool_call_then_done(
                "h1",
                "vfs_write",
                json!({"path": "site/index.html", "content": "<!DOCTYPE html>\n<html><head><title>Demo</title></head><body></body></html>"}),
            ),
            ScriptedTurn::tool_call_then_done("h2", "signal_parent", json!({"message": "page built"})),
            ScriptedTurn::text_then_done("done building", 1),
        ],
    );
    provider.script(
        "agents/css-dev.md",
        vec![
            ScriptedTurn::tool_call_then_done("s1", "vfs_write", json!({"path": "site/styles.css", "content": ":root { --bg: #fff; }\nbody { background: var(--bg); }"})),
            ScriptedTurn::tool_call_then_done("s2", "signal_parent", json!({"message": "page styled"})),
            ScriptedTurn::text_then_done("done styling", 1),
        ],
    );
    provider.script(
        "agents/qa-reviewer.md",
        vec![
            ScriptedTurn::tool_call_then_done("q1", "vfs_write", json!({"path": "artifacts/qa-report.md", "content": "# QA Report\n\nNo defects found."})),
            ScriptedTurn::tool_call_then_done("q2", "signal_parent", json!({"message": "review complete"})),
            ScriptedTurn::text_then_done("done reviewing", 1),
        ],
    );

    let agents = AgentRegistry::new();
    for (path, prompt) in [
        ("agents/lead.md", "You lead a small web project and delegate to specialists."),
        ("agents/researcher.md", "You research the product space."),
        ("agents/designer.md", "You write design specs."),
        ("agents/html-dev.md", "You build HTML pages."),
        ("agents/css-dev.md", "You style pages with CSS."),
        ("agents/qa-reviewer.md", "You review finished work."),
    ] {
        agents.register(profile(path, prompt));
    }

    let vfs = Vfs::new();
    let events = EventLog::with_vfs(vfs.clone());
    let mut config = KernelConfig::default();
    config.max_concurrency = 1;
    config.max_fanout = 10;
    let kernel = Kernel::new(config, base_deps(provider, agents, vfs.clone(), events.clone()));

    kernel.enqueue(Activation::root("agents/lead.md", "ship a small marketing site"));

    tokio::time::timeout(Duration::from_secs(10), kernel.run_until_empty())
        .await
        .context("demo project did not settle within 10s")?;

    for (path, needle) in [
        ("artifacts/design-spec.md", None),
        ("site/index.html", Some("<!DOCTYPE html>")),
        ("site/styles.css", Some(":root")),
        ("artifacts/qa-report.md", None),
        ("artifacts/summary.md", None),
    ] {
        let file = vfs.read(path).ok_or_else(|| anyhow!("expected '{path}' to exist in the workspace"))?;
        if let Some(needle) = needle {
            if !file.content.contains(needle) {
                bail!("expected '{path}' to contain '{needle}'");
            }
        }
    }

    let mut spawn_count = 0u32;
    let mut signal_count = 0u32;
    let mut complete_count = 0u32;
    let mut error_count = 0u32;
    for entry in events.entries() {
        match entry.event_type {
            EventType::Spawn => spawn_count += 1,
            EventType::Signal => signal_count += 1,
            EventType::Complete => complete_count += 1,
            EventType::Error => error_count += 1,
            _ => {}
        }
    }
    if spawn_count < 5 {
        bail!("expected at least 5 spawn events, got {spawn_count}");
    }
    if signal_count < 5 {
        bail!("expected at least 5 signal events, got {signal_count}");
    }
    if complete_count < 5 {
        bail!("expected at least 5 complete events, got {complete_count}");
    }
    if error_count != 0 {
        bail!("expected no error events, got {error_count}");
    }

    Ok(ScenarioReport {
        name: "s6",
        detail: format!("demo project produced every artifact ({spawn_count} spawns, {signal_count} signals, {complete_count} completions, 0 errors)"),
    })
}
