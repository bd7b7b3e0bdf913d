use serde::{Deserialize, Serialize};

use crate::policy::Policy;

/// A custom tool an `AgentProfile` contributes on top of the kernel's
/// built-ins. The kernel consumes this struct — it does not parse the
/// agent file's frontmatter itself (that belongs to the host harness).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomToolDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    /// Opaque handler reference the host's tool plugin resolves by name.
    pub handler_ref: String,
}

/// An agent's static configuration, as consumed by the kernel.
///
/// The kernel never parses agent markdown/frontmatter itself — a host
/// adapter is responsible for turning an agent file into this struct before
/// handing it to `Kernel::enqueue`/`AgentRegistry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    pub system_prompt: String,
    #[serde(default)]
    pub custom_tools: Vec<CustomToolDef>,
    pub policy: Policy,
}
