//! Arena of cancellable background tasks.
//!
//! Timers owned by the scheduler and the highlight controller are spawned
//! through a [`TaskArena`] so teardown can cancel every one of them. Ids are
//! handed out from a monotonically increasing counter and never reused.

use std::collections::BTreeMap;
use std::future::Future;

use petriflow_types::TaskId;
use tokio::task::AbortHandle;

#[derive(Debug)]
struct TaskEntry {
    label: &'static str,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
pub struct TaskArena {
    next_id: u64,
    tasks: BTreeMap<TaskId, TaskEntry>,
}

impl TaskArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` on the current tokio runtime and track it.
    ///
    /// Must be called from within a runtime context.
    pub fn spawn<F>(&mut self, label: &'static str, future: F) -> TaskId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.prune();
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        let handle = tokio::spawn(future).abort_handle();
        tracing::debug!(task = %id, label, "Spawned task");
        self.tasks.insert(id, TaskEntry { label, handle });
        id
    }

    /// Cancel one task. Returns `false` if it was unknown or already finished.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some(entry) if !entry.handle.is_finished() => {
                entry.handle.abort();
                tracing::debug!(task = %id, label = entry.label, "Cancelled task");
                true
            }
            _ => false,
        }
    }

    /// Cancel every live task. Returns how many were still running.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for (id, entry) in std::mem::take(&mut self.tasks) {
            if !entry.handle.is_finished() {
                entry.handle.abort();
                tracing::debug!(task = %id, label = entry.label, "Cancelled task");
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks
            .get(&id)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// Number of tasks that have not finished yet.
    #[must_use]
    pub fn live(&self) -> usize {
        self.tasks
            .values()
            .filter(|entry| !entry.handle.is_finished())
            .count()
    }

    fn prune(&mut self) {
        self.tasks.retain(|_, entry| !entry.handle.is_finished());
    }
}

impl Drop for TaskArena {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
