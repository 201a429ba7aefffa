use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskDeadline, TaskId};

/// Identity of a sent reminder: the task and the exact deadline it was sent for.
/// Editing a deadline produces a different key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReminderKey {
    pub task_id: TaskId,
    pub deadline_ms: i64,
}

impl ReminderKey {
    pub fn new(task_id: impl Into<TaskId>, deadline: TaskDeadline) -> Self {
        Self {
            task_id: task_id.into(),
            deadline_ms: deadline.timestamp_millis(),
        }
    }

    pub fn for_task(task: &Task) -> Option<Self> {
        task.deadline.map(|deadline| Self::new(task.id.clone(), deadline))
    }
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reminder_sent_{}_{}", self.task_id, self.deadline_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub emails: BTreeSet<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct StoredState {
    pub schema_version: u32,
    #[serde(flatten)]
    pub state: TrackerState,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct StoredLedger {
    pub schema_version: u32,
    #[serde(default)]
    pub sent: BTreeSet<ReminderKey>,
}
