use serde::{Deserialize, Serialize};

/// Internal tool call format (provider-agnostic). Every `AIProvider` adapter
/// converts its wire-specific tool call representation to/from this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition exposed to the LLM (schema list consumed by providers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A single turn's message history entry.
///
/// `Tool` carries both the call and its result as one entry rather than two
/// separate messages — the kernel appends it once the handler has already
/// produced a result, so there is never a "pending tool call" state visible
/// in history.
///
/// Invariant: `Model` text for a turn is appended only when that turn had
/// **no** tool calls. Provider-side state already folds model text around
/// tool exchanges when tool calls occurred, so appending both would
/// duplicate content on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User { content: String },
    Model { content: String },
    Tool {
        name: String,
        call_id: String,
        args: serde_json::Value,
        result: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::Model { content: content.into() }
    }

    pub fn tool(call: &ToolCall, result: impl Into<String>) -> Self {
        Self::Tool {
            name: call.tool_name.clone(),
            call_id: call.call_id.clone(),
            args: call.arguments.clone(),
            result: result.into(),
        }
    }

    /// The plain-text content of this message, for transcript/summary views.
    pub fn text(&self) -> String {
        match self {
            Message::User { content } | Message::Model { content } => content.clone(),
            Message::Tool { name, result, .. } => format!("[{name}] {result}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_message_text_includes_name() {
        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: "vfs_read".into(),
            arguments: serde_json::json!({"path": "memory/x.md"}),
        };
        let msg = Message::tool(&call, "hello");
        assert_eq!(msg.text(), "[vfs_read] hello");
    }

    #[test]
    fn user_and_model_text_roundtrip() {
        assert_eq!(Message::user("hi").text(), "hi");
        assert_eq!(Message::model("hi back").text(), "hi back");
    }
}
