use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// One working-memory entry. Multi-valued by key: writing the same key
/// again appends a new entry rather than overwriting, so history within a
/// run is preserved.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: u64,
    pub key: String,
    pub value: String,
    pub tags: Vec<String>,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
}

/// Input to `WorkingMemory::write`.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub key: String,
    pub value: String,
    pub tags: Vec<String>,
    pub author: String,
}

/// Entries returned by `end_run`, detached from the store.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub run_id: String,
    pub entries: Vec<Entry>,
}

enum State {
    Dormant,
    Active { run_id: String, entries: Vec<Entry>, next_id: u64 },
}

/// Ephemeral, run-scoped key/value/tag store. Writes are no-ops outside an
/// active run rather than errors, since a tool calling `memory_write` before
/// `init_run` has nothing in-flight to corrupt.
pub struct WorkingMemory {
    state: RwLock<State>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self { state: RwLock::new(State::Dormant) }
    }

    pub fn init_run(&self, run_id: impl Into<String>) {
        *self.state.write() = State::Active { run_id: run_id.into(), entries: Vec::new(), next_id: 1 };
    }

    pub fn write(&self, input: NewEntry) {
        let mut state = self.state.write();
        if let State::Active { run_id, entries, next_id } = &mut *state {
            entries.push(Entry {
                id: *next_id,
                key: input.key,
                value: input.value,
                tags: input.tags,
                author: input.author,
                timestamp: Utc::now(),
                run_id: run_id.clone(),
            });
            *next_id += 1;
        }
    }

    pub fn read(&self, query: &str, tags: Option<&[String]>) -> Vec<Entry> {
        let state = self.state.read();
        let entries = match &*state {
            State::Active { entries, .. } => entries,
            State::Dormant => return Vec::new(),
        };
        let query_lower = query.to_lowercase();
        let mut matches: Vec<Entry> = entries
            .iter()
            .filter(|e| {
                let text_match =
                    e.key.to_lowercase().contains(&query_lower) || e.value.to_lowercase().contains(&query_lower);
                let tag_match = match tags {
                    None => true,
                    Some(wanted) => wanted.iter().any(|t| e.tags.contains(t)),
                };
                text_match && tag_match
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches
    }

    pub fn end_run(&self) -> Snapshot {
        let mut state = self.state.write();
        let taken = std::mem::replace(&mut *state, State::Dormant);
        match taken {
            State::Active { run_id, entries, .. } => Snapshot { run_id, entries },
            State::Dormant => Snapshot { run_id: String::new(), entries: Vec::new() },
        }
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str, tags: &[&str]) -> NewEntry {
        NewEntry {
            key: key.to_string(),
            value: value.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            author: "agent-a".to_string(),
        }
    }

    #[test]
    fn write_before_init_run_is_a_noop() {
        let wm = WorkingMemory::new();
        wm.write(entry("k", "v", &[]));
        assert!(wm.read("v", None).is_empty());
    }

    #[test]
    fn init_run_clears_prior_state() {
        let wm = WorkingMemory::new();
        wm.init_run("run-1");
        wm.write(entry("k", "v", &[]));
        wm.init_run("run-2");
        assert!(wm.read("v", None).is_empty());
    }

    #[test]
    fn read_filters_by_query_and_tags_case_insensitively() {
        let wm = WorkingMemory::new();
        wm.init_run("run-1");
        wm.write(entry("Status", "Blocked on review", &["tool-failure"]));
        wm.write(entry("Note", "looks fine", &["ok"]));

        let by_text = wm.read("blocked", None);
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].key, "Status");

        let by_tag = wm.read("", Some(&["ok".to_string()]));
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].key, "Note");
    }

    #[test]
    fn read_sorts_newest_first() {
        let wm = WorkingMemory::new();
        wm.init_run("run-1");
        wm.write(entry("a", "first", &[]));
        wm.write(entry("b", "second", &[]));
        let all = wm.read("", None);
        assert_eq!(all[0].key, "b");
        assert_eq!(all[1].key, "a");
    }

    #[test]
    fn end_run_returns_snapshot_and_returns_to_dormant() {
        let wm = WorkingMemory::new();
        wm.init_run("run-1");
        wm.write(entry("k", "v", &[]));

        let snapshot = wm.end_run();
        assert_eq!(snapshot.run_id, "run-1");
        assert_eq!(snapshot.entries.len(), 1);
        assert!(wm.read("v", None).is_empty());
    }
}
