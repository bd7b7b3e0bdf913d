use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A glob pattern string, normalized at construction time:
/// backslashes become `/`, a leading `./` is stripped, and a trailing `/`
/// is expanded to `/**` (matches anything under that prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobPattern(pub String);

impl GlobPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let mut s = raw.into().replace('\\', "/");
        if let Some(stripped) = s.strip_prefix("./") {
            s = stripped.to_string();
        }
        if s.ends_with('/') {
            s.push_str("**");
        }
        Self(s)
    }

    /// The literal (non-wildcard) prefix of the pattern, used by `vfs_list`
    /// checks to test prefix/prefix-of-prefix overlap against `reads`/`writes`.
    pub fn literal_base(&self) -> &str {
        let end = self
            .0
            .find(['*', '?'])
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl<S: Into<String>> From<S> for GlobPattern {
    fn from(s: S) -> Self {
        GlobPattern::new(s)
    }
}

/// Access-control mode. `GlovesOff` bypasses every policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Safe,
    Balanced,
    GlovesOff,
}

/// Boolean capability grants independent of path-based read/write scopes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub spawn_agents: bool,
    #[serde(default)]
    pub signal_parent: bool,
    #[serde(default)]
    pub web_access: bool,
    #[serde(default)]
    pub delete_files: bool,
    #[serde(default)]
    pub edit_agents: bool,
    #[serde(default)]
    pub custom_tools: bool,
}

/// Declarative access controls for one agent, derived from its profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub mode: PolicyMode,
    #[serde(default)]
    pub reads: Vec<GlobPattern>,
    #[serde(default)]
    pub writes: Vec<GlobPattern>,
    #[serde(default)]
    pub allowed_tools: HashSet<String>,
    #[serde(default)]
    pub blocked_tools: HashSet<String>,
    #[serde(default)]
    pub permissions: Permissions,
    /// Substrings that, found case-insensitively in an activation's input,
    /// escalate the effective policy for that activation to `GlovesOff`.
    #[serde(default)]
    pub gloves_off_triggers: Vec<String>,
}

impl Policy {
    /// A permissive default used by tests and by agents with no frontmatter
    /// policy block.
    pub fn balanced() -> Self {
        Self {
            mode: PolicyMode::Balanced,
            reads: vec![GlobPattern::new("**")],
            writes: vec![GlobPattern::new("**")],
            allowed_tools: HashSet::new(),
            blocked_tools: HashSet::new(),
            permissions: Permissions {
                spawn_agents: true,
                signal_parent: true,
                web_access: true,
                delete_files: true,
                edit_agents: false,
                custom_tools: true,
            },
            gloves_off_triggers: Vec::new(),
        }
    }
}
