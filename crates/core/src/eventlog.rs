use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ok_domain::events::{EventLogEntry, EventSink, NewEvent};
use ok_domain::trace::TraceEvent;
use ok_vfs::Vfs;
use parking_lot::RwLock;

const MAX_CHECKPOINTS: usize = 200;
const KEEP_FIRST: usize = 10;
const KEEP_LAST: usize = 100;

/// Full path→content snapshot taken at the moment one event was appended.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub event_id: u64,
    pub timestamp: DateTime<Utc>,
    pub snapshot: HashMap<String, String>,
}

/// Append-only event stream with optional VFS-backed checkpoint snapshots.
///
/// Implements `EventSink` so `ok-tools` and the kernel's turn loop can
/// append through the trait without depending on this concrete type (see
/// `ok_domain::events::EventSink` for why that seam exists).
pub struct EventLog {
    entries: RwLock<Vec<EventLogEntry>>,
    checkpoints: RwLock<Vec<Checkpoint>>,
    next_id: AtomicU64,
    vfs: Option<Arc<Vfs>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entries: RwLock::new(Vec::new()), checkpoints: RwLock::new(Vec::new()), next_id: AtomicU64::new(1), vfs: None })
    }

    pub fn with_vfs(vfs: Arc<Vfs>) -> Arc<Self> {
        Arc::new(Self { entries: RwLock::new(Vec::new()), checkpoints: RwLock::new(Vec::new()), next_id: AtomicU64::new(1), vfs: Some(vfs) })
    }

    pub fn entries(&self) -> Vec<EventLogEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact match if the checkpoint for `event_id` was retained; otherwise
    /// the most recent surviving checkpoint whose timestamp is no later
    /// than the event's, so coarse time travel still works across trimmed
    /// regions. `None` if `event_id` was never appended.
    pub fn get_checkpoint(&self, event_id: u64) -> Option<Checkpoint> {
        let checkpoints = self.checkpoints.read();
        if let Some(exact) = checkpoints.iter().find(|c| c.event_id == event_id) {
            return Some(exact.clone());
        }
        let target_ts = self.entries.read().iter().find(|e| e.id == event_id)?.timestamp;
        checkpoints.iter().filter(|c| c.timestamp <= target_ts).max_by_key(|c| c.timestamp).cloned()
    }

    fn snapshot_vfs(&self, vfs: &Vfs) -> HashMap<String, String> {
        vfs.get_all_paths().into_iter().filter_map(|p| vfs.read(&p).map(|f| (p, f.content))).collect()
    }

    fn trim_checkpoints(&self) {
        let mut checkpoints = self.checkpoints.write();
        let len = checkpoints.len();
        if len <= MAX_CHECKPOINTS {
            return;
        }

        let keep_first = KEEP_FIRST.min(len);
        let keep_last = KEEP_LAST.min(len - keep_first);
        let middle_start = keep_first;
        let middle_end = len - keep_last;
        let middle_len = middle_end.saturating_sub(middle_start);
        let middle_budget = MAX_CHECKPOINTS.saturating_sub(keep_first + keep_last);

        let mut kept: Vec<usize> = (0..keep_first).collect();
        if middle_budget > 0 && middle_len > 0 {
            let stride = ((middle_len as f64) / (middle_budget as f64)).ceil().max(1.0) as usize;
            let mut i = middle_start;
            while i < middle_end && kept.len() < keep_first + middle_budget {
                kept.push(i);
                i += stride;
            }
        }
        kept.extend(middle_end..len);

        let dropped = len - kept.len();
        let retained: Vec<Checkpoint> = kept.into_iter().map(|i| checkpoints[i].clone()).collect();
        let retained_count = retained.len();
        *checkpoints = retained;
        drop(checkpoints);

        TraceEvent::CheckpointTrimmed { retained: retained_count, dropped }.emit();
    }
}

impl EventSink for EventLog {
    fn append(&self, event: NewEvent) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let timestamp = Utc::now();
        self.entries.write().push(EventLogEntry {
            id,
            timestamp,
            event_type: event.event_type,
            agent_id: event.agent_id,
            activation_id: event.activation_id,
            data: event.data,
        });

        if let Some(vfs) = &self.vfs {
            let snapshot = self.snapshot_vfs(vfs);
            self.checkpoints.write().push(Checkpoint { event_id: id, timestamp, snapshot });
            self.trim_checkpoints();
        }

        id
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self { entries: RwLock::new(Vec::new()), checkpoints: RwLock::new(Vec::new()), next_id: AtomicU64::new(1), vfs: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ok_domain::events::EventType;

    #[test]
    fn append_assigns_monotonic_ids() {
        let log = EventLog::new();
        let a = log.append(NewEvent::new(EventType::Activation, "agents/a.md"));
        let b = log.append(NewEvent::new(EventType::Activation, "agents/a.md"));
        assert_eq!(b, a + 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn without_vfs_no_checkpoints_are_taken() {
        let log = EventLog::new();
        log.append(NewEvent::new(EventType::Activation, "agents/a.md"));
        assert!(log.get_checkpoint(1).is_none());
    }

    #[test]
    fn checkpoint_count_stays_at_or_below_200_with_first_and_last_retained() {
        let vfs = Vfs::new();
        let log = EventLog::with_vfs(vfs.clone());

        for i in 0..300u32 {
            vfs.write(&format!("artifacts/{i}.md"), i.to_string(), "agents/a.md");
            log.append(NewEvent::new(EventType::FileChange, "agents/a.md"));
        }

        let checkpoints = log.checkpoints.read();
        assert!(checkpoints.len() <= 200);
        let ids: Vec<u64> = checkpoints.iter().map(|c| c.event_id).collect();
        for first_id in 1..=10u64 {
            assert!(ids.contains(&first_id), "expected first-10 checkpoint {first_id} retained");
        }
        for last_id in 201..=300u64 {
            assert!(ids.contains(&last_id), "expected last-100 checkpoint {last_id} retained");
        }
    }

    #[test]
    fn get_checkpoint_falls_back_to_most_recent_at_or_before() {
        let vfs = Vfs::new();
        let log = EventLog::with_vfs(vfs.clone());
        for i in 0..300u32 {
            vfs.write(&format!("artifacts/{i}.md"), i.to_string(), "agents/a.md");
            log.append(NewEvent::new(EventType::FileChange, "agents/a.md"));
        }

        // Some middle event id is very likely trimmed; the fallback must
        // still return the nearest surviving checkpoint at or before it.
        let checkpoint = log.get_checkpoint(150).unwrap();
        assert!(checkpoint.event_id <= 150);
    }
}
