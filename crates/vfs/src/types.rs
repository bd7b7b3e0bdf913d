use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of a VFS path, derived from its prefix.
///
/// Purely advisory — the store never enforces it, tools use it to decide
/// what a path is "for" (e.g. routing `memory/*` writes through long-term
/// memory consolidation instead of a plain file read).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VfsKind {
    Agent,
    Memory,
    Artifact,
    Workflow,
    Unknown,
}

impl VfsKind {
    pub fn of(path: &str) -> Self {
        let trimmed = path.trim_start_matches('/');
        if trimmed.starts_with("agents/") {
            VfsKind::Agent
        } else if trimmed.starts_with("memory/") {
            VfsKind::Memory
        } else if trimmed.starts_with("artifacts/") {
            VfsKind::Artifact
        } else if trimmed.starts_with("workflows/") {
            VfsKind::Workflow
        } else {
            VfsKind::Unknown
        }
    }
}

/// One recorded write to a path. `diff` is empty for the very first version
/// of a path and for content-identical rewrites (which still append a new
/// version so the history stays a faithful write log).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVersion {
    pub version: usize,
    pub content: String,
    pub diff: String,
    pub written_by: String,
    pub timestamp: DateTime<Utc>,
}

/// Current state of a path plus its full version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VFSFile {
    pub path: String,
    pub kind: VfsKind,
    pub content: String,
    pub versions: Vec<FileVersion>,
}

impl VFSFile {
    pub fn current_version(&self) -> usize {
        self.versions.len()
    }
}
