use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ok_domain::Result;
use ok_memory::{MemoryType, MemoryVector, StoreInput, UpdateInput};
use ok_sessions::Session;
use ok_vfs::Vfs;
use serde::{Deserialize, Serialize};

const HISTORY_TAIL: usize = 20;
const MESSAGE_TRUNCATE_CHARS: usize = 500;

/// One candidate memory a `SummarizeFn` extracts from a run's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMemory {
    #[serde(rename = "type")]
    pub mem_type: MemoryType,
    pub content: String,
    pub tags: Vec<String>,
}

/// One consolidation decision a `ConsolidateFn` returns for a candidate or
/// an existing memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ConsolidationOp {
    Keep,
    Update { id: String, content: Option<String>, tags: Option<Vec<String>> },
    Delete { id: String },
    Add { #[serde(rename = "type")] mem_type: MemoryType, content: String, tags: Vec<String> },
    Skip { index: usize },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsolidationResult {
    pub operations: Vec<ConsolidationOp>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Turns run context into candidate memories. A trait-object boxed closure
/// rather than a generic parameter: a fresh one is built per
/// `AutonomousRunner` cycle from whatever provider that cycle is configured
/// with, and this crate should not be monomorphized over every provider
/// implementation just to call it.
pub type SummarizeFn = Box<dyn Fn(String) -> BoxFuture<'static, Result<Vec<ExtractedMemory>>> + Send + Sync>;

/// Merges candidate memories against existing LTM for one agent.
pub type ConsolidateFn = Box<dyn Fn(String) -> BoxFuture<'static, Result<ConsolidationResult>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CapacityTier {
    Generous,
    Selective,
    HeavyCut,
}

impl CapacityTier {
    fn classify(existing_json_len: usize) -> Self {
        let pct = (existing_json_len.div_ceil(4)) as f64 / 1_000_000.0;
        if pct < 0.30 {
            CapacityTier::Generous
        } else if pct <= 0.50 {
            CapacityTier::Selective
        } else {
            CapacityTier::HeavyCut
        }
    }

    fn label(self) -> &'static str {
        match self {
            CapacityTier::Generous => "GENEROUS",
            CapacityTier::Selective => "SELECTIVE",
            CapacityTier::HeavyCut => "HEAVY_CUT",
        }
    }
}

/// End-of-run memory extraction and consolidation: builds a textual digest
/// of one run, asks `summarize` for candidate memories, then either merges
/// them against existing long-term memory through `consolidate` or stores
/// them verbatim.
pub struct Summarizer {
    vfs: Arc<Vfs>,
    summarize: SummarizeFn,
    consolidate: Option<ConsolidateFn>,
}

impl Summarizer {
    pub fn new(vfs: Arc<Vfs>, summarize: SummarizeFn, consolidate: Option<ConsolidateFn>) -> Self {
        Self { vfs, summarize, consolidate }
    }

    /// Runs the full five-step process against one completed run. `existing`
    /// is every current LTM entry for the resolved agent id (or global
    /// scope); `store`/`update`/`remove` are applied by the caller, which
    /// owns the concrete `LongTermMemory<E>` this crate has no generic
    /// parameter for.
    pub async fn summarize_run(
        &self,
        working_memory: &[ok_memory::working::Entry],
        sessions: &[Session],
        existing: Vec<MemoryVector>,
    ) -> SummarizeOutcome {
        let context = self.build_context(working_memory, sessions);

        let candidates = match (self.summarize)(context).await {
            Ok(c) => c,
            Err(_) => return SummarizeOutcome { agent_id: self.resolve_agent_id(sessions), ops: Vec::new() },
        };

        let agent_id = self.resolve_agent_id(sessions);

        let Some(consolidate) = &self.consolidate else {
            let ops = candidates
                .into_iter()
                .map(|c| AppliedOp::Add { mem_type: c.mem_type, content: c.content, tags: c.tags })
                .collect();
            return SummarizeOutcome { agent_id, ops };
        };

        if candidates.is_empty() {
            return SummarizeOutcome { agent_id, ops: Vec::new() };
        }

        let existing_json = serde_json::to_string(&existing.iter().map(ExistingView::from).collect::<Vec<_>>()).unwrap_or_default();
        let tier = CapacityTier::classify(existing_json.len());
        let prompt = self.build_consolidation_prompt(tier, &existing, &candidates);

        match consolidate(prompt).await {
            Ok(result) => SummarizeOutcome { agent_id, ops: result.operations.into_iter().map(AppliedOp::from).collect() },
            Err(_) => {
                let ops = candidates
                    .into_iter()
                    .map(|c| AppliedOp::Add { mem_type: c.mem_type, content: c.content, tags: c.tags })
                    .collect();
                SummarizeOutcome { agent_id, ops }
            }
        }
    }

    fn resolve_agent_id(&self, sessions: &[Session]) -> String {
        let mut ids = sessions.iter().map(|s| s.agent_id.clone());
        match ids.next() {
            Some(first) if sessions.iter().all(|s| s.agent_id == first) => first,
            _ => "global".to_string(),
        }
    }

    fn build_context(&self, working_memory: &[ok_memory::working::Entry], sessions: &[Session]) -> String {
        let mut out = String::new();

        out.push_str("## Files Created This Run\n\n");
        for path in self.vfs.get_all_paths() {
            if path.starts_with("agents/") || path == "memory/long-term-memory.json" {
                continue;
            }
            if let Some(file) = self.vfs.read(&path) {
                out.push_str(&format!("### {path}\n\n{}\n\n", file.content));
            }
        }

        out.push_str("## Working Memory\n\n");
        for entry in working_memory {
            out.push_str(&format!("- [{}] {}: {}\n", entry.author, entry.key, entry.value));
        }
        out.push('\n');

        out.push_str("## Session Histories\n\n");
        for session in sessions {
            out.push_str(&format!("### {} ({})\n\n", session.agent_id, session.activation_id));
            let tail: Vec<&ok_domain::tool::Message> =
                session.history.iter().rev().take(HISTORY_TAIL).collect::<Vec<_>>().into_iter().rev().collect();
            for message in tail {
                let text: String = message.text().chars().take(MESSAGE_TRUNCATE_CHARS).collect();
                out.push_str(&format!("- {text}\n"));
            }
            out.push('\n');
        }

        out
    }

    fn build_consolidation_prompt(&self, tier: CapacityTier, existing: &[MemoryVector], candidates: &[ExtractedMemory]) -> String {
        let mut out = format!("Memory capacity tier: {}\n\n## Existing Memories\n\n", tier.label());
        for memory in existing {
            out.push_str(&format!(
                "- id={} type={:?} access_count={} tags={:?} content={}\n",
                memory.id, memory.mem_type, memory.access_count, memory.tags, memory.content
            ));
        }
        out.push_str("\n## Candidate Memories\n\n");
        for (i, candidate) in candidates.iter().enumerate() {
            out.push_str(&format!("- index={} type={:?} tags={:?} content={}\n", i, candidate.mem_type, candidate.tags, candidate.content));
        }
        out
    }
}

#[derive(Serialize)]
struct ExistingView<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    mem_type: MemoryType,
    access_count: u32,
    tags: &'a [String],
    content: &'a str,
}

impl<'a> From<&'a MemoryVector> for ExistingView<'a> {
    fn from(m: &'a MemoryVector) -> Self {
        Self { id: &m.id, mem_type: m.mem_type, access_count: m.access_count, tags: &m.tags, content: &m.content }
    }
}

/// One decision, flattened to exactly what the caller needs to apply it —
/// the `consolidate`-free path and the consolidation path both reduce to
/// this so the apply step is a single loop regardless of which path ran.
pub enum AppliedOp {
    Add { mem_type: MemoryType, content: String, tags: Vec<String> },
    Update { id: String, content: Option<String>, tags: Option<Vec<String>> },
    Delete { id: String },
    NoOp,
}

impl From<ConsolidationOp> for AppliedOp {
    fn from(op: ConsolidationOp) -> Self {
        match op {
            ConsolidationOp::Add { mem_type, content, tags } => AppliedOp::Add { mem_type, content, tags },
            ConsolidationOp::Update { id, content, tags } => AppliedOp::Update { id, content, tags },
            ConsolidationOp::Delete { id } => AppliedOp::Delete { id },
            ConsolidationOp::Keep | ConsolidationOp::Skip { .. } => AppliedOp::NoOp,
        }
    }
}

pub struct SummarizeOutcome {
    pub agent_id: String,
    pub ops: Vec<AppliedOp>,
}

/// Applies a `SummarizeOutcome` against a concrete `LongTermMemory<E>`.
/// Kept as a free function (rather than a `Summarizer` method) so this
/// crate never needs to be generic over `E` itself.
pub async fn apply_outcome<E: ok_providers::EmbeddingEngine + 'static>(
    ltm: &ok_memory::LongTermMemory<E>,
    outcome: SummarizeOutcome,
) {
    for op in outcome.ops {
        match op {
            AppliedOp::Add { mem_type, content, tags } => {
                let _ = ltm.store(StoreInput { agent_id: outcome.agent_id.clone(), content, mem_type, tags }).await;
            }
            AppliedOp::Update { id, content, tags } => {
                let _ = ltm.update(&id, UpdateInput { content, tags, mem_type: None, shared: None }).await;
            }
            AppliedOp::Delete { id } => {
                ltm.remove(&id);
            }
            AppliedOp::NoOp => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ok_domain::activation::Activation;
    use ok_domain::tool::Message;
    use ok_memory::{LongTermMemory, MemoryType};
    use ok_providers::HashEmbeddingEngine;
    use tokio_util::sync::CancellationToken;

    fn session(agent: &str, input: &str) -> Session {
        let activation = Activation::root(agent, input);
        Session::open(&activation, CancellationToken::new())
    }

    fn summarize_ok(memories: Vec<ExtractedMemory>) -> SummarizeFn {
        Box::new(move |_ctx| {
            let memories = memories.clone();
            Box::pin(async move { Ok(memories) })
        })
    }

    fn summarize_err() -> SummarizeFn {
        Box::new(|_ctx| Box::pin(async move { Err(ok_domain::Error::Other("model unavailable".into())) }))
    }

    #[tokio::test]
    async fn no_consolidate_fn_adds_all_candidates_verbatim() {
        let vfs = Vfs::new();
        let candidates = vec![ExtractedMemory { mem_type: MemoryType::Fact, content: "the build is green".into(), tags: vec![] }];
        let summarizer = Summarizer::new(vfs, summarize_ok(candidates), None);

        let outcome = summarizer.summarize_run(&[], &[session("agents/writer.md", "go")], vec![]).await;
        assert_eq!(outcome.agent_id, "agents/writer.md");
        assert_eq!(outcome.ops.len(), 1);
        assert!(matches!(outcome.ops[0], AppliedOp::Add { .. }));
    }

    #[tokio::test]
    async fn summarize_error_returns_silently_with_no_ops() {
        let vfs = Vfs::new();
        let summarizer = Summarizer::new(vfs, summarize_err(), None);
        let outcome = summarizer.summarize_run(&[], &[session("agents/writer.md", "go")], vec![]).await;
        assert!(outcome.ops.is_empty());
    }

    #[tokio::test]
    async fn mixed_agent_sessions_resolve_to_global() {
        let vfs = Vfs::new();
        let summarizer = Summarizer::new(vfs, summarize_ok(vec![]), None);
        let sessions = vec![session("agents/a.md", "go"), session("agents/b.md", "go")];
        let outcome = summarizer.summarize_run(&[], &sessions, vec![]).await;
        assert_eq!(outcome.agent_id, "global");
    }

    #[tokio::test]
    async fn consolidation_failure_falls_back_to_add_all() {
        let vfs = Vfs::new();
        let candidates = vec![ExtractedMemory { mem_type: MemoryType::Fact, content: "fact one".into(), tags: vec![] }];
        let consolidate: ConsolidateFn = Box::new(|_prompt| Box::pin(async move { Err(ok_domain::Error::Other("throw".into())) }));
        let summarizer = Summarizer::new(vfs, summarize_ok(candidates), Some(consolidate));

        let outcome = summarizer.summarize_run(&[], &[session("agents/writer.md", "go")], vec![]).await;
        assert_eq!(outcome.ops.len(), 1);
        assert!(matches!(outcome.ops[0], AppliedOp::Add { .. }));
    }

    #[tokio::test]
    async fn consolidation_applies_add_update_delete_and_skips_keep() {
        let vfs = Vfs::new();
        let ltm = LongTermMemory::<HashEmbeddingEngine>::keyword_only();
        let existing = ltm
            .store(StoreInput { agent_id: "global".into(), content: "stale fact".into(), mem_type: MemoryType::Fact, tags: vec![] })
            .await
            .unwrap();
        let existing_id = existing.id.clone();

        let candidates = vec![ExtractedMemory { mem_type: MemoryType::Fact, content: "new fact".into(), tags: vec![] }];
        let ops = vec![
            ConsolidationOp::Update { id: existing_id.clone(), content: Some("refreshed fact".into()), tags: None },
            ConsolidationOp::Add { mem_type: MemoryType::Fact, content: "new fact".into(), tags: vec![] },
            ConsolidationOp::Keep,
        ];
        let consolidate: ConsolidateFn = Box::new(move |_prompt| {
            let ops = ops.clone();
            Box::pin(async move { Ok(ConsolidationResult { operations: ops }) })
        });
        let summarizer = Summarizer::new(vfs, summarize_ok(candidates), Some(consolidate));

        let outcome = summarizer.summarize_run(&[], &[session("agents/writer.md", "go")], vec![existing]).await;
        assert_eq!(outcome.ops.len(), 3);

        apply_outcome(&ltm, outcome).await;
        assert_eq!(ltm.len(), 2);
        let refreshed = ltm.get(&existing_id).unwrap();
        assert_eq!(refreshed.content, "refreshed fact");
    }

    #[tokio::test]
    async fn capacity_tier_classification_matches_thresholds() {
        assert_eq!(CapacityTier::classify(0), CapacityTier::Generous);
        assert_eq!(CapacityTier::classify(1_000_000), CapacityTier::Selective);
        assert_eq!(CapacityTier::classify(2_100_000), CapacityTier::HeavyCut);
    }

    #[tokio::test]
    async fn context_excludes_agent_files_and_long_term_memory_json() {
        let vfs = Vfs::new();
        vfs.write("agents/writer.md", "profile text", "agent-a");
        vfs.write("memory/long-term-memory.json", "[]", "agent-a");
        vfs.write("artifacts/report.md", "the report body", "agent-a");
        let summarizer = Summarizer::new(vfs, summarize_ok(vec![]), None);

        let context = summarizer.build_context(&[], &[]);
        assert!(!context.contains("profile text"));
        assert!(!context.contains("[]"));
        assert!(context.contains("the report body"));
    }

    #[allow(dead_code)]
    fn _uses(_m: Message) {}

    #[allow(dead_code)]
    fn _uses_time(_t: chrono::DateTime<Utc>) {}
}
