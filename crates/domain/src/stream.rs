use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for `AIProvider` streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// A chunk of a streamed provider response.
///
/// The turn loop interprets chunks as they arrive: `Text` accumulates,
/// `ToolCall` dispatches through the tool handler, `Done` closes out the
/// turn's token accounting, `Error` marks the session errored (and may
/// trigger a quota halt if the message matches a quota pattern).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamChunk {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_call")]
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },

    #[serde(rename = "done")]
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        token_count: Option<u64>,
    },

    #[serde(rename = "error")]
    Error { error: String },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Patterns that mark a provider error as a quota/rate-limit condition
/// rather than a generic failure. Matched case-insensitively as substrings.
pub const QUOTA_ERROR_PATTERNS: &[&str] = &[
    "quota",
    "rate limit",
    "rate-limit",
    "429",
    "too many requests",
    "resource exhausted",
    "resource_exhausted",
    "exceeded",
];

/// Whether an error string looks like a quota/rate-limit condition.
///
/// `"exceeded"` alone is too broad a substring (e.g. "deadline exceeded"),
/// so it only counts when paired with "quota" elsewhere in the same message;
/// every other pattern is a standalone match.
pub fn looks_like_quota_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    if lower.contains("exceeded") && lower.contains("quota") {
        return true;
    }
    QUOTA_ERROR_PATTERNS
        .iter()
        .filter(|p| **p != "exceeded")
        .any(|p| lower.contains(p))
}
