use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ok_domain::Result;
use ok_providers::EmbeddingEngine;
use parking_lot::RwLock;

use crate::vector::{AddInput, MemoryType, MemoryVector, SearchOptions, UpdateInput, VectorStore, GLOBAL_AGENT};

pub struct StoreInput {
    pub agent_id: String,
    pub content: String,
    pub mem_type: MemoryType,
    pub tags: Vec<String>,
}

/// Where `LongTermMemory` persists and retrieves from: a cosine-search
/// vector index, or a plain map scored by keyword overlap. Retrieval takes
/// a different path per SPEC_FULL.md §4.6 depending on which this is.
enum Backing<E: EmbeddingEngine> {
    Vector(Arc<VectorStore<E>>),
    Keyword(RwLock<HashMap<String, MemoryVector>>),
}

pub struct LongTermMemory<E: EmbeddingEngine> {
    backing: Backing<E>,
}

impl<E: EmbeddingEngine> LongTermMemory<E> {
    pub fn with_vector_store(store: Arc<VectorStore<E>>) -> Self {
        Self { backing: Backing::Vector(store) }
    }

    pub fn keyword_only() -> Self {
        Self { backing: Backing::Keyword(RwLock::new(HashMap::new())) }
    }

    pub async fn store(&self, input: StoreInput) -> Result<MemoryVector> {
        let id = format!("ltm-{}-{}", Self::next_counter(), Utc::now().timestamp_millis());
        match &self.backing {
            Backing::Vector(store) => {
                store
                    .add(AddInput {
                        id,
                        agent_id: input.agent_id,
                        content: input.content,
                        mem_type: input.mem_type,
                        tags: input.tags,
                    })
                    .await
            }
            Backing::Keyword(map) => {
                let now = Utc::now();
                let shared = input.agent_id == GLOBAL_AGENT;
                let memory = MemoryVector {
                    id,
                    agent_id: input.agent_id,
                    content: input.content,
                    mem_type: input.mem_type,
                    tags: input.tags,
                    created_at: now,
                    updated_at: now,
                    access_count: 0,
                    last_accessed_at: now,
                    shared,
                    embedding: Vec::new(),
                };
                map.write().insert(memory.id.clone(), memory.clone());
                Ok(memory)
            }
        }
    }

    fn next_counter() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, id: &str) -> Option<MemoryVector> {
        match &self.backing {
            Backing::Vector(store) => store.get(id),
            Backing::Keyword(map) => map.read().get(id).cloned(),
        }
    }

    /// Mutates content/tags in place, preserving id, access count, and
    /// creation time. A no-op returning `None` if `id` does not exist.
    pub async fn update(&self, id: &str, update: UpdateInput) -> Result<Option<MemoryVector>> {
        match &self.backing {
            Backing::Vector(store) => store.update(id, update).await,
            Backing::Keyword(map) => {
                let mut map = map.write();
                let Some(memory) = map.get_mut(id) else { return Ok(None) };
                if let Some(content) = update.content {
                    memory.content = content;
                }
                if let Some(tags) = update.tags {
                    memory.tags = tags;
                }
                if let Some(mem_type) = update.mem_type {
                    memory.mem_type = mem_type;
                }
                if let Some(shared) = update.shared {
                    memory.shared = shared;
                }
                memory.updated_at = Utc::now();
                Ok(Some(memory.clone()))
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<MemoryVector> {
        match &self.backing {
            Backing::Vector(store) => store.remove(id),
            Backing::Keyword(map) => map.write().remove(id),
        }
    }

    pub fn all(&self) -> Vec<MemoryVector> {
        match &self.backing {
            Backing::Vector(store) => store.all(),
            Backing::Keyword(map) => map.read().values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Vector(store) => store.len(),
            Backing::Keyword(map) => map.read().len(),
        }
    }

    pub async fn retrieve(&self, agent_id: &str, context: &str, max_entries: usize) -> Result<Vec<MemoryVector>> {
        match &self.backing {
            Backing::Vector(store) => {
                let results = store
                    .search(
                        context,
                        SearchOptions { agent_id: Some(agent_id.to_string()), limit: Some(max_entries), ..Default::default() },
                    )
                    .await?;
                let mut memories = Vec::with_capacity(results.len());
                for scored in results {
                    store.touch_access(&scored.memory.id);
                    memories.push(store.get(&scored.memory.id).unwrap_or(scored.memory));
                }
                Ok(memories)
            }
            Backing::Keyword(map) => {
                let context_tokens = tokenize(context);
                let now = Utc::now();

                let mut scored: Vec<(String, f64)> = map
                    .read()
                    .values()
                    .filter(|m| m.agent_id == agent_id || m.agent_id == GLOBAL_AGENT)
                    .map(|m| (m.id.clone(), keyword_score(m, &context_tokens, now)))
                    .collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(max_entries);

                let mut map = map.write();
                let mut results = Vec::with_capacity(scored.len());
                for (id, _) in scored {
                    if let Some(memory) = map.get_mut(&id) {
                        memory.access_count += 1;
                        memory.last_accessed_at = now;
                        results.push(memory.clone());
                    }
                }
                Ok(results)
            }
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn keyword_score(memory: &MemoryVector, context_tokens: &[String], now: chrono::DateTime<Utc>) -> f64 {
    let tag_words: Vec<String> = memory.tags.iter().flat_map(|t| tokenize(t)).collect();
    let content_words = tokenize(&memory.content);

    let tag_hits = context_tokens.iter().filter(|t| tag_words.contains(t)).count() as f64;
    let content_hits = context_tokens.iter().filter(|t| content_words.contains(t)).count() as f64;

    let age_days = (now - memory.created_at).num_seconds() as f64 / 86_400.0;
    let recency = (2.0 - age_days * 0.3).max(0.0);
    let access_bonus = 0.5 * ((memory.access_count as f64 + 1.0).log2());
    let mistake_bonus = if memory.mem_type == MemoryType::Mistake { 2.0 } else { 0.0 };

    3.0 * tag_hits + 1.0 * content_hits + recency + access_bonus + mistake_bonus
}
