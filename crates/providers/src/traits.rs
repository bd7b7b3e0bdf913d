use ok_domain::stream::{BoxStream, StreamChunk};
use ok_domain::tool::{Message, ToolDefinition};
use ok_domain::Result;

/// Per-call context an `AIProvider` needs to drive one turn.
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub session_id: String,
    pub system_prompt: String,
    pub model: String,
}

/// Trait every model backend implements. A turn is one `chat` call; the
/// kernel interprets the returned stream chunk by chunk and never calls
/// back into the provider mid-stream except through `abort`.
#[async_trait::async_trait]
pub trait AIProvider: Send + Sync {
    async fn chat(
        &self,
        ctx: ChatContext,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<BoxStream<'static, StreamChunk>>;

    /// Called once a session reaches a terminal state. Default no-op for
    /// providers with no session-scoped resources to release.
    async fn end_session(&self, _session_id: &str) {}

    /// Best-effort cancellation of an in-flight stream.
    async fn abort(&self, _session_id: &str) {}
}

/// Optional capability: a provider that needs to be told up front which
/// agent a session belongs to, so it can look up scripted or cached
/// behavior for that agent path. Re-expresses the "does this provider
/// support registerSession" duck-typing check as an explicit trait the
/// kernel probes for instead of inspecting the provider's shape at runtime.
#[async_trait::async_trait]
pub trait SessionRegisterable: Send + Sync {
    async fn register_session(&self, session_id: &str, agent_path: &str);
}

/// `text -> f32 vector` embedding backend. Output dimension is fixed per
/// implementation and is never inspected by callers beyond using `len()`
/// for cosine similarity.
#[async_trait::async_trait]
pub trait EmbeddingEngine: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn is_ready(&self) -> bool {
        true
    }
}
