use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::error::{OrganizeError, Result};

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub batch_id: u64,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub status: TaskStatus,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
}

pub struct Task {
    info: Mutex<TaskInfo>,
}

impl Task {
    fn new(batch_id: u64, total: usize) -> Self {
        Self {
            info: Mutex::new(TaskInfo {
                batch_id,
                total,
                processed: 0,
                succeeded: 0,
                failed: 0,
                status: TaskStatus::Running,
            }),
        }
    }

    fn info(&self) -> MutexGuard<'_, TaskInfo> {
        self.info.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, success: bool) {
        let mut info = self.info();
        info.processed += 1;
        if success {
            info.succeeded += 1;
        } else {
            info.failed += 1;
        }
    }

    pub fn complete(&self) {
        self.info().status = TaskStatus::Completed;
    }

    pub fn get_info(&self) -> TaskInfo {
        self.info().clone()
    }
}

#[derive(Default)]
struct Slot {
    current: Option<Arc<Task>>,
    next_id: u64,
}

/// Allows one batch in flight. A second caller is turned away, never queued.
#[derive(Default)]
pub struct TaskManager {
    slot: Mutex<Slot>,
}

/// Holds the in-flight slot; dropping it frees the slot even on panic.
pub struct TaskGuard<'a> {
    manager: &'a TaskManager,
    task: Arc<Task>,
}

impl TaskGuard<'_> {
    pub fn task(&self) -> &Task {
        &self.task
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.task.complete();
        self.manager.slot().current = None;
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn try_start(&self, total: usize) -> Result<TaskGuard<'_>> {
        let mut slot = self.slot();
        if slot.current.is_some() {
            return Err(OrganizeError::EngineBusy);
        }

        slot.next_id += 1;
        let task = Arc::new(Task::new(slot.next_id, total));
        slot.current = Some(task.clone());
        Ok(TaskGuard { manager: self, task })
    }

    pub fn has_running_task(&self) -> bool {
        self.slot().current.is_some()
    }

    pub fn current(&self) -> Option<TaskInfo> {
        self.slot().current.as_ref().map(|task| task.get_info())
    }
}
