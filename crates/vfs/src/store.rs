use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ok_domain::trace::TraceEvent;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::diff::unified_line_diff;
use crate::types::{FileVersion, VFSFile, VfsKind};

/// Emitted to subscribers on every write or delete. `prev` is `None` for a
/// path's first write; `new` is `None` for a delete.
#[derive(Debug, Clone)]
pub struct VfsChange {
    pub path: String,
    pub prev: Option<VFSFile>,
    pub new: Option<VFSFile>,
}

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// In-memory, version-tracked filesystem shared across a run's agents.
///
/// Paths are opaque UTF-8 strings — there is no directory structure to
/// create or remove, "directories" are just common prefixes other paths
/// happen to share. History is append-only: a `write` never mutates an
/// existing `FileVersion`, it appends a new one, even when the content is
/// unchanged from the previous version.
pub struct Vfs {
    files: RwLock<HashMap<String, VFSFile>>,
    changes: broadcast::Sender<VfsChange>,
}

impl Vfs {
    pub fn new() -> Arc<Self> {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Arc::new(Self {
            files: RwLock::new(HashMap::new()),
            changes,
        })
    }

    /// Subscribe to every future write/delete across all paths.
    pub fn subscribe(&self) -> broadcast::Receiver<VfsChange> {
        self.changes.subscribe()
    }

    pub fn read(&self, path: &str) -> Option<VFSFile> {
        self.files.read().get(path).cloned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    pub fn write(&self, path: &str, content: impl Into<String>, written_by: impl Into<String>) -> VFSFile {
        let content = content.into();
        let written_by = written_by.into();
        let mut files = self.files.write();
        let prev = files.get(path).cloned();
        let prev_content = prev.as_ref().map(|f| f.content.as_str()).unwrap_or("");
        let diff = unified_line_diff(prev_content, &content);

        let mut versions = prev.as_ref().map(|f| f.versions.clone()).unwrap_or_default();
        let version = FileVersion {
            version: versions.len() + 1,
            content: content.clone(),
            diff: diff.clone(),
            written_by,
            timestamp: Utc::now(),
        };
        versions.push(version);

        let file = VFSFile {
            path: path.to_string(),
            kind: VfsKind::of(path),
            content,
            versions,
        };
        files.insert(path.to_string(), file.clone());
        drop(files);

        TraceEvent::VfsWrite {
            path: path.to_string(),
            version: file.current_version(),
            diff_lines: diff.lines().count(),
        }
        .emit();

        let _ = self.changes.send(VfsChange {
            path: path.to_string(),
            prev,
            new: Some(file.clone()),
        });

        file
    }

    pub fn delete(&self, path: &str) -> Option<VFSFile> {
        let removed = self.files.write().remove(path);
        if let Some(ref file) = removed {
            let _ = self.changes.send(VfsChange {
                path: path.to_string(),
                prev: Some(file.clone()),
                new: None,
            });
        }
        removed
    }

    pub fn list(&self, prefix: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .read()
            .keys()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    pub fn get_versions(&self, path: &str) -> Vec<FileVersion> {
        self.files.read().get(path).map(|f| f.versions.clone()).unwrap_or_default()
    }

    pub fn get_all_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Distinct top-level segments ("agents", "memory", ...) among all
    /// live paths, used by tools that want to know what kinds of content
    /// currently exist without scanning every path themselves.
    pub fn get_existing_prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self
            .files
            .read()
            .keys()
            .filter_map(|p| p.trim_start_matches('/').split('/').next().map(|s| s.to_string()))
            .collect();
        prefixes.sort();
        prefixes.dedup();
        prefixes
    }
}

impl Default for Vfs {
    fn default() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            files: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_appends_monotonic_versions() {
        let vfs = Vfs::new();
        vfs.write("agents/a/notes.md", "one", "agent-a");
        vfs.write("agents/a/notes.md", "two", "agent-a");
        vfs.write("agents/a/notes.md", "three", "agent-a");

        let versions = vfs.get_versions("agents/a/notes.md");
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].version, 1);
        assert_eq!(versions[2].version, 3);
        for pair in versions.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn identical_rewrite_still_appends_a_version() {
        let vfs = Vfs::new();
        vfs.write("memory/scratch", "same", "agent-a");
        vfs.write("memory/scratch", "same", "agent-a");

        let versions = vfs.get_versions("memory/scratch");
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].diff, "");
    }

    #[test]
    fn diffs_reconstruct_current_content() {
        let vfs = Vfs::new();
        vfs.write("artifacts/report.md", "line1", "agent-a");
        vfs.write("artifacts/report.md", "line1\nline2", "agent-a");
        vfs.write("artifacts/report.md", "line2", "agent-a");

        let file = vfs.read("artifacts/report.md").unwrap();
        assert_eq!(file.content, "line2");
        assert_eq!(file.versions.len(), 3);
    }

    #[test]
    fn delete_removes_from_live_map_but_not_already_cloned_history() {
        let vfs = Vfs::new();
        vfs.write("workflows/plan", "draft", "agent-a");
        let observed = vfs.read("workflows/plan").unwrap();

        vfs.delete("workflows/plan");

        assert!(!vfs.exists("workflows/plan"));
        assert_eq!(observed.versions.len(), 1);
    }

    #[test]
    fn list_filters_by_prefix_and_prefixes_are_deduped() {
        let vfs = Vfs::new();
        vfs.write("agents/a/notes.md", "x", "agent-a");
        vfs.write("agents/b/notes.md", "y", "agent-b");
        vfs.write("memory/index", "z", "agent-a");

        assert_eq!(vfs.list("agents/").len(), 2);
        assert_eq!(vfs.get_existing_prefixes(), vec!["agents".to_string(), "memory".to_string()]);
    }

    #[tokio::test]
    async fn subscribers_receive_prev_and_new_state() {
        let vfs = Vfs::new();
        let mut rx = vfs.subscribe();

        vfs.write("agents/a/notes.md", "first", "agent-a");
        let change = rx.recv().await.unwrap();
        assert!(change.prev.is_none());
        assert_eq!(change.new.unwrap().content, "first");

        vfs.write("agents/a/notes.md", "second", "agent-a");
        let change = rx.recv().await.unwrap();
        assert_eq!(change.prev.unwrap().content, "first");
        assert_eq!(change.new.unwrap().content, "second");
    }
}
