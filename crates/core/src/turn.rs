use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use ok_domain::stream::StreamChunk;
use ok_domain::tool::{Message, ToolCall, ToolDefinition};
use ok_domain::Result;
use ok_providers::{AIProvider, ChatContext};
use ok_tools::{ToolContext, ToolRegistry};
use tokio_util::sync::CancellationToken;

/// Outcome of consuming one provider stream to completion: the accumulated
/// text, any tool-call messages produced along the way, and how the stream
/// ended. One turn is one provider round-trip plus its tool-call sub-loop,
/// matching the teacher's `run_turn` shape of a single model exchange.
pub struct TurnResult {
    pub text: String,
    pub had_tool_calls: bool,
    pub tool_messages: Vec<Message>,
    pub token_count: Option<u64>,
    pub error: Option<String>,
    pub aborted: bool,
}

/// Runs one turn: stream from `provider`, accumulate text, dispatch every
/// tool call through `ok_tools::dispatch`, and stop at `done`/`error`/
/// cancellation. Pausing mid-turn is honored only between tool calls (the
/// kernel's worker pauses there, never mid-stream-chunk).
#[allow(clippy::too_many_arguments)]
pub async fn run_turn(
    provider: &dyn AIProvider,
    chat_ctx: ChatContext,
    history: &[Message],
    tools: &[ToolDefinition],
    tool_ctx: &ToolContext,
    tool_registry: &ToolRegistry,
    is_custom_tool: impl Fn(&str) -> bool,
    cancel: &CancellationToken,
    paused: &AtomicBool,
) -> Result<TurnResult> {
    let mut stream = provider.chat(chat_ctx, history, tools).await?;

    let mut text = String::new();
    let mut tool_messages = Vec::new();
    let mut had_tool_calls = false;
    let mut token_count = None;
    let mut error = None;
    let mut aborted = false;

    loop {
        if cancel.is_cancelled() {
            aborted = true;
            break;
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            chunk = stream.next() => chunk,
        };

        let Some(chunk) = next else {
            if cancel.is_cancelled() {
                aborted = true;
            }
            break;
        };

        match chunk {
            StreamChunk::Text { text: t } => text.push_str(&t),
            StreamChunk::ToolCall { id, name, args } => {
                had_tool_calls = true;

                while paused.load(Ordering::SeqCst) {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                    }
                    if cancel.is_cancelled() {
                        break;
                    }
                }
                if cancel.is_cancelled() {
                    aborted = true;
                    break;
                }

                let call = ToolCall { call_id: id, tool_name: name, arguments: args };
                let result = ok_tools::dispatch(tool_ctx, tool_registry, is_custom_tool(&call.tool_name), &call).await;
                tool_messages.push(Message::tool(&call, result));
            }
            StreamChunk::Done { token_count: tc } => {
                token_count = tc;
                break;
            }
            StreamChunk::Error { error: e } => {
                error = Some(e);
                break;
            }
        }
    }

    Ok(TurnResult { text, had_tool_calls, tool_messages, token_count, error, aborted })
}
