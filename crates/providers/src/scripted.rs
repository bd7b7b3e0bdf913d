use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use ok_domain::stream::{BoxStream, StreamChunk};
use ok_domain::tool::{Message, ToolDefinition};
use ok_domain::{Error, Result};
use parking_lot::RwLock;

use crate::traits::{AIProvider, ChatContext, SessionRegisterable};

/// One scripted turn: the chunks a turn yields, in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    pub chunks: Vec<StreamChunk>,
}

impl ScriptedTurn {
    pub fn text_then_done(text: impl Into<String>, token_count: u64) -> Self {
        Self {
            chunks: vec![
                StreamChunk::Text { text: text.into() },
                StreamChunk::Done { token_count: Some(token_count) },
            ],
        }
    }

    pub fn tool_call_then_done(id: impl Into<String>, name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            chunks: vec![
                StreamChunk::ToolCall { id: id.into(), name: name.into(), args },
                StreamChunk::Done { token_count: None },
            ],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            chunks: vec![StreamChunk::Error { error: message.into() }],
        }
    }
}

/// Canned-response provider for tests and demo scenarios. Each agent path
/// gets its own queue of turns; calling `chat` for that path a second time
/// pops the next turn, simulating a multi-turn conversation without a real
/// model. `register_session` (the `SessionRegisterable` capability) is how
/// the kernel tells the provider which agent path a session id belongs to —
/// sessions that are never registered fall back to treating the session id
/// itself as the lookup key.
pub struct ScriptedProvider {
    turns_by_agent: RwLock<HashMap<String, VecDeque<ScriptedTurn>>>,
    session_agent: RwLock<HashMap<String, String>>,
    chunk_delay: Duration,
}

impl ScriptedProvider {
    pub fn new(chunk_delay: Duration) -> Self {
        Self {
            turns_by_agent: RwLock::new(HashMap::new()),
            session_agent: RwLock::new(HashMap::new()),
            chunk_delay,
        }
    }

    /// Queue turns for an agent path, in the order they should be served.
    pub fn script(&self, agent_path: impl Into<String>, turns: Vec<ScriptedTurn>) {
        self.turns_by_agent
            .write()
            .entry(agent_path.into())
            .or_default()
            .extend(turns);
    }

    fn resolve_agent(&self, session_id: &str) -> String {
        self.session_agent
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| session_id.to_string())
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new(Duration::from_millis(0))
    }
}

#[async_trait::async_trait]
impl AIProvider for ScriptedProvider {
    async fn chat(
        &self,
        ctx: ChatContext,
        _history: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<BoxStream<'static, StreamChunk>> {
        let agent_path = self.resolve_agent(&ctx.session_id);
        let turn = self
            .turns_by_agent
            .write()
            .get_mut(&agent_path)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| Error::Other(format!("scripted provider exhausted for agent '{agent_path}'")))?;

        let delay = self.chunk_delay;
        let stream = async_stream::stream! {
            for chunk in turn.chunks {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield chunk;
            }
        };
        Ok(Box::pin(stream))
    }
}

#[async_trait::async_trait]
impl SessionRegisterable for ScriptedProvider {
    async fn register_session(&self, session_id: &str, agent_path: &str) {
        self.session_agent
            .write()
            .insert(session_id.to_string(), agent_path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn replays_turns_in_order_per_agent() {
        let provider = ScriptedProvider::default();
        provider.script(
            "agents/writer.md",
            vec![ScriptedTurn::text_then_done("hi", 10)],
        );
        provider.register_session("sess-1", "agents/writer.md").await;

        let ctx = ChatContext {
            session_id: "sess-1".into(),
            system_prompt: String::new(),
            model: "default/base".into(),
        };
        let mut stream = provider.chat(ctx, &[], &[]).await.unwrap();
        let first = stream.next().await.unwrap();
        assert!(matches!(first, StreamChunk::Text { .. }));
        let second = stream.next().await.unwrap();
        assert!(matches!(second, StreamChunk::Done { token_count: Some(10) }));
    }

    #[tokio::test]
    async fn exhausted_script_returns_error() {
        let provider = ScriptedProvider::default();
        let ctx = ChatContext {
            session_id: "agents/unscripted.md".into(),
            system_prompt: String::new(),
            model: "default/base".into(),
        };
        let result = provider.chat(ctx, &[], &[]).await;
        assert!(result.is_err());
    }
}
