use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: u64,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Plain task list shared across an autonomous run's cycles, read and
/// written only through the `task_queue_read`/`task_queue_write` built-ins.
/// Kept separate from `WorkingMemory` since its entries must survive the
/// `init_run`/`end_run` boundary between cycles rather than being cleared
/// by it.
pub struct TaskQueueStore {
    tasks: RwLock<Vec<TaskItem>>,
    next_id: RwLock<u64>,
}

impl TaskQueueStore {
    pub fn new() -> Self {
        Self { tasks: RwLock::new(Vec::new()), next_id: RwLock::new(1) }
    }

    pub fn add(&self, description: impl Into<String>, created_by: impl Into<String>) -> TaskItem {
        let mut next_id = self.next_id.write();
        let item = TaskItem {
            id: *next_id,
            description: description.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            created_by: created_by.into(),
        };
        *next_id += 1;
        self.tasks.write().push(item.clone());
        item
    }

    pub fn complete(&self, id: u64) -> bool {
        let mut tasks = self.tasks.write();
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(t) => {
                t.status = TaskStatus::Done;
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> Vec<TaskItem> {
        self.tasks.read().iter().filter(|t| t.status == TaskStatus::Pending).cloned().collect()
    }

    pub fn all(&self) -> Vec<TaskItem> {
        self.tasks.read().clone()
    }

    pub fn is_empty_pending(&self) -> bool {
        self.pending().is_empty()
    }

    /// Drops every task and resets id assignment, for the autonomous
    /// runner's "clear the task queue" step at the start of a mission.
    pub fn clear(&self) {
        self.tasks.write().clear();
        *self.next_id.write() = 1;
    }
}

impl Default for TaskQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_complete_drops_it_from_pending() {
        let store = TaskQueueStore::new();
        let item = store.add("write the report", "agents/planner.md");
        assert_eq!(store.pending().len(), 1);

        assert!(store.complete(item.id));
        assert!(store.pending().is_empty());
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn complete_on_unknown_id_returns_false() {
        let store = TaskQueueStore::new();
        assert!(!store.complete(999));
    }

    #[test]
    fn ids_are_assigned_in_order() {
        let store = TaskQueueStore::new();
        let a = store.add("a", "agents/x.md");
        let b = store.add("b", "agents/x.md");
        assert_eq!(b.id, a.id + 1);
    }

    #[test]
    fn clear_drops_tasks_and_resets_ids() {
        let store = TaskQueueStore::new();
        store.add("a", "agents/x.md");
        store.clear();
        assert!(store.all().is_empty());
        let next = store.add("b", "agents/x.md");
        assert_eq!(next.id, 1);
    }
}
