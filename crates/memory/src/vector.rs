use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ok_domain::Result;
use ok_providers::EmbeddingEngine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub const GLOBAL_AGENT: &str = "global";
const DEFAULT_SEARCH_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryType {
    Fact,
    Procedure,
    Observation,
    Mistake,
    Preference,
    Skill,
}

/// A long-term memory plus its embedding, as held by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryVector {
    pub id: String,
    pub agent_id: String,
    pub content: String,
    pub mem_type: MemoryType,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u32,
    pub last_accessed_at: DateTime<Utc>,
    /// Derived from `agent_id == "global"` at construction time.
    pub shared: bool,
    pub embedding: Vec<f32>,
}

pub struct AddInput {
    pub id: String,
    pub agent_id: String,
    pub content: String,
    pub mem_type: MemoryType,
    pub tags: Vec<String>,
}

#[derive(Default)]
pub struct UpdateInput {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub mem_type: Option<MemoryType>,
    pub shared: Option<bool>,
}

#[derive(Default)]
pub struct SearchOptions {
    pub agent_id: Option<String>,
    pub mem_type: Option<MemoryType>,
    pub tags: Vec<String>,
    pub limit: Option<usize>,
    pub min_score: Option<f32>,
    pub keyword_filter: Option<Vec<String>>,
}

pub struct ScoredMemory {
    pub memory: MemoryVector,
    pub score: f32,
}

pub struct SearchDiagnostics {
    pub results: Vec<ScoredMemory>,
    pub total_vectors: usize,
    pub candidate_count: usize,
    pub filtered_out_by_keywords: usize,
    pub filtered_out_by_min_score: usize,
    pub duration_ms: u128,
}

/// Embedding index with cosine-similarity search over long-term memories.
/// Generic over the embedding backend so tests run against
/// `ok_providers::HashEmbeddingEngine` without pulling in a real model.
pub struct VectorStore<E: EmbeddingEngine> {
    embedder: Arc<E>,
    vectors: RwLock<HashMap<String, MemoryVector>>,
}

impl<E: EmbeddingEngine> VectorStore<E> {
    pub fn new(embedder: Arc<E>) -> Self {
        Self { embedder, vectors: RwLock::new(HashMap::new()) }
    }

    pub async fn add(&self, input: AddInput) -> Result<MemoryVector> {
        let embedding = self.embedder.embed(&input.content).await?;
        let now = Utc::now();
        let shared = input.agent_id == GLOBAL_AGENT;
        let vector = MemoryVector {
            id: input.id,
            agent_id: input.agent_id,
            content: input.content,
            mem_type: input.mem_type,
            tags: input.tags,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed_at: now,
            shared,
            embedding,
        };
        self.vectors.write().insert(vector.id.clone(), vector.clone());
        Ok(vector)
    }

    pub async fn update(&self, id: &str, update: UpdateInput) -> Result<Option<MemoryVector>> {
        let needs_reembed = update.content.is_some();
        let content_for_embed = update.content.clone();

        let new_embedding = if needs_reembed {
            Some(self.embedder.embed(content_for_embed.as_deref().unwrap_or_default()).await?)
        } else {
            None
        };

        let mut vectors = self.vectors.write();
        let Some(vector) = vectors.get_mut(id) else { return Ok(None) };
        if let Some(content) = update.content {
            vector.content = content;
        }
        if let Some(tags) = update.tags {
            vector.tags = tags;
        }
        if let Some(mem_type) = update.mem_type {
            vector.mem_type = mem_type;
        }
        if let Some(shared) = update.shared {
            vector.shared = shared;
        }
        if let Some(embedding) = new_embedding {
            vector.embedding = embedding;
        }
        vector.updated_at = Utc::now();
        Ok(Some(vector.clone()))
    }

    /// Bump access bookkeeping for a retrieved memory without touching its
    /// content or embedding.
    pub fn touch_access(&self, id: &str) {
        if let Some(vector) = self.vectors.write().get_mut(id) {
            vector.access_count += 1;
            vector.last_accessed_at = Utc::now();
        }
    }

    pub fn get(&self, id: &str) -> Option<MemoryVector> {
        self.vectors.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, id: &str) -> Option<MemoryVector> {
        self.vectors.write().remove(id)
    }

    pub fn all(&self) -> Vec<MemoryVector> {
        self.vectors.read().values().cloned().collect()
    }

    pub async fn search(&self, query: &str, opts: SearchOptions) -> Result<Vec<ScoredMemory>> {
        Ok(self.search_diagnostics(query, opts).await?.results)
    }

    pub async fn search_diagnostics(&self, query: &str, opts: SearchOptions) -> Result<SearchDiagnostics> {
        let start = Instant::now();
        let total_vectors = self.vectors.read().len();

        let candidates: Vec<MemoryVector> = self
            .vectors
            .read()
            .values()
            .filter(|v| match &opts.agent_id {
                Some(agent_id) => v.agent_id == *agent_id || v.agent_id == GLOBAL_AGENT || v.shared,
                None => true,
            })
            .filter(|v| opts.mem_type.map(|t| t == v.mem_type).unwrap_or(true))
            .filter(|v| opts.tags.is_empty() || opts.tags.iter().any(|t| v.tags.contains(t)))
            .cloned()
            .collect();
        let candidate_count = candidates.len();

        let keyword_tokens: Option<Vec<String>> = opts
            .keyword_filter
            .as_ref()
            .map(|tokens| tokens.iter().map(|t| t.to_lowercase()).collect());

        let mut filtered_out_by_keywords = 0usize;
        let after_keywords: Vec<MemoryVector> = candidates
            .into_iter()
            .filter(|v| match &keyword_tokens {
                None => true,
                Some(tokens) => {
                    let content_lower = v.content.to_lowercase();
                    let keep = tokens.iter().any(|t| content_lower.contains(t.as_str()));
                    if !keep {
                        filtered_out_by_keywords += 1;
                    }
                    keep
                }
            })
            .collect();

        let query_embedding = self.embedder.embed(query).await?;
        let mut scored: Vec<ScoredMemory> = after_keywords
            .into_iter()
            .map(|memory| {
                let score = cosine(&query_embedding, &memory.embedding);
                ScoredMemory { memory, score }
            })
            .collect();

        let mut filtered_out_by_min_score = 0usize;
        if let Some(min_score) = opts.min_score {
            let before = scored.len();
            scored.retain(|s| s.score >= min_score);
            filtered_out_by_min_score = before - scored.len();
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let limit = opts.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        scored.truncate(limit);

        Ok(SearchDiagnostics {
            results: scored,
            total_vectors,
            candidate_count,
            filtered_out_by_keywords,
            filtered_out_by_min_score,
            duration_ms: start.elapsed().as_millis(),
        })
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
