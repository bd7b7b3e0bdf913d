use ok_domain::Result;
use ok_providers::EmbeddingEngine;

use crate::ltm::LongTermMemory;
use crate::vector::{MemoryType, MemoryVector};

/// Object-safe view of "something that can build a memory prompt", so a
/// kernel holding `Arc<dyn MemoryPromptSource>` never needs to be generic
/// over the embedding engine `LongTermMemory<E>` happens to use.
#[async_trait::async_trait]
pub trait MemoryPromptSource: Send + Sync {
    async fn build_prompt(&self, agent_id: &str, context: &str) -> Result<String>;
}

#[async_trait::async_trait]
impl<E: EmbeddingEngine + Send + Sync + 'static> MemoryPromptSource for LongTermMemory<E> {
    async fn build_prompt(&self, agent_id: &str, context: &str) -> Result<String> {
        build_memory_prompt(self, agent_id, context, None, None).await
    }
}

const DEFAULT_MAX_ENTRIES: usize = 10;

fn approx_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

fn type_label(mem_type: MemoryType) -> &'static str {
    match mem_type {
        MemoryType::Fact => "fact",
        MemoryType::Procedure => "procedure",
        MemoryType::Observation => "observation",
        MemoryType::Mistake => "mistake",
        MemoryType::Preference => "preference",
        MemoryType::Skill => "skill",
    }
}

fn bullet(memory: &MemoryVector) -> String {
    if memory.tags.is_empty() {
        format!("- **[{}]** {}\n", type_label(memory.mem_type), memory.content)
    } else {
        format!(
            "- **[{}]** {} _(tags: {})_\n",
            type_label(memory.mem_type),
            memory.content,
            memory.tags.join(", ")
        )
    }
}

/// Retrieve memories for `agent_id`/`context` and render them as a markdown
/// block suitable for prefixing onto a system prompt. Returns an empty
/// string when nothing is retrieved, so callers can splice the result in
/// unconditionally without an extra empty-section check.
pub async fn build_memory_prompt<E: EmbeddingEngine>(
    ltm: &LongTermMemory<E>,
    agent_id: &str,
    context: &str,
    max_entries: Option<usize>,
    token_budget: Option<usize>,
) -> Result<String> {
    let memories = ltm.retrieve(agent_id, context, max_entries.unwrap_or(DEFAULT_MAX_ENTRIES)).await?;
    if memories.is_empty() {
        return Ok(String::new());
    }

    let header = "## Memory Context\n";
    let mut out = String::from(header);
    let mut budget_remaining = token_budget.map(|b| b.saturating_sub(approx_tokens(header)));

    for memory in &memories {
        let line = bullet(memory);
        let line_tokens = approx_tokens(&line);
        if let Some(remaining) = budget_remaining {
            if line_tokens > remaining {
                break;
            }
            budget_remaining = Some(remaining - line_tokens);
        }
        out.push_str(&line);
    }

    if out == header {
        return Ok(String::new());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltm::StoreInput;
    use ok_providers::HashEmbeddingEngine;

    #[tokio::test]
    async fn empty_when_nothing_retrieved() {
        let ltm = LongTermMemory::<HashEmbeddingEngine>::keyword_only();
        let prompt = build_memory_prompt(&ltm, "agents/writer.md", "anything", None, None).await.unwrap();
        assert_eq!(prompt, "");
    }

    #[tokio::test]
    async fn formats_bullets_with_type_and_tags() {
        let ltm = LongTermMemory::<HashEmbeddingEngine>::keyword_only();
        ltm.store(StoreInput {
            agent_id: "global".into(),
            content: "prefer concise commit messages".into(),
            mem_type: MemoryType::Preference,
            tags: vec!["style".into(), "git".into()],
        })
        .await
        .unwrap();

        let prompt = build_memory_prompt(&ltm, "global", "commit messages", None, None).await.unwrap();
        assert!(prompt.starts_with("## Memory Context\n"));
        assert!(prompt.contains("**[preference]**"));
        assert!(prompt.contains("_(tags: style, git)_"));
    }

    #[tokio::test]
    async fn stops_adding_bullets_once_budget_exceeded() {
        let ltm = LongTermMemory::<HashEmbeddingEngine>::keyword_only();
        for i in 0..5 {
            ltm.store(StoreInput {
                agent_id: "global".into(),
                content: format!("fact number {i} about the system architecture and its constraints"),
                mem_type: MemoryType::Fact,
                tags: vec![],
            })
            .await
            .unwrap();
        }

        let prompt = build_memory_prompt(&ltm, "global", "system", None, Some(20)).await.unwrap();
        let bullet_count = prompt.lines().filter(|l| l.starts_with("- ")).count();
        assert!(bullet_count < 5);
    }
}
