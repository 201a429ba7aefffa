use std::fmt;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type TaskId = String;

const URGENT_WINDOW: TimeDelta = TimeDelta::hours(1);

/// A deadline normalized to millisecond precision, the resolution reminder keys are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskDeadline(DateTime<Utc>);

impl TaskDeadline {
    pub fn new(inner: DateTime<Utc>) -> Self {
        let millis = inner.nanosecond() / 1_000_000 * 1_000_000;
        Self(inner.with_nanosecond(millis).unwrap_or(inner))
    }

    pub fn from_timestamp_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    pub fn time(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl From<DateTime<Utc>> for TaskDeadline {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_deadline"
    )]
    pub deadline: Option<TaskDeadline>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(TaskDeadline::new(deadline));
        self
    }

    pub fn deadline_status(&self, now: DateTime<Utc>) -> DeadlineStatus {
        let Some(deadline) = self.deadline.filter(|_| !self.completed) else {
            return DeadlineStatus::None;
        };

        let remaining = *deadline.time() - now;
        if remaining < TimeDelta::zero() {
            DeadlineStatus::Overdue
        } else {
            DeadlineStatus::Due {
                remaining: Remaining(remaining),
                urgent: remaining < URGENT_WINDOW,
            }
        }
    }
}

/// Deadlines are read leniently: RFC 3339 strings or epoch milliseconds.
/// Anything else is logged and treated as "no deadline".
fn lenient_deadline<'de, D>(deserializer: D) -> Result<Option<TaskDeadline>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = match &raw {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| TaskDeadline::new(dt.with_timezone(&Utc))),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(TaskDeadline::from_timestamp_millis),
        Some(_) => None,
    };

    if parsed.is_none() {
        log::warn!("Ignoring unparsable task deadline. [value = {:?}]", raw);
    }

    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineStatus {
    None,
    Overdue,
    Due { remaining: Remaining, urgent: bool },
}

/// Time left until a deadline, rendered the way the task list shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining(pub TimeDelta);

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0.num_hours();
        let minutes = self.0.num_minutes() % 60;
        let days = hours / 24;

        if days > 0 {
            write!(f, "{}d {}h", days, hours % 24)
        } else if hours > 0 {
            write!(f, "{}h {}m", hours, minutes)
        } else {
            write!(f, "{}m", minutes)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub percentage: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("No task with id {0}")]
    NotFound(TaskId),
}

/// Ordered task collection, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn add(
        &mut self,
        text: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> &Task {
        let mut id = now.timestamp_millis();
        while self.find(&id.to_string()).is_some() {
            id += 1;
        }

        let task = Task {
            id: id.to_string(),
            text: text.into(),
            completed: false,
            deadline: deadline.map(TaskDeadline::new),
        };
        self.tasks.insert(0, task);
        &self.tasks[0]
    }

    pub fn toggle(&mut self, id: &str) -> Result<&Task, TaskError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| TaskError::NotFound(id.to_owned()))?;
        task.completed = !task.completed;
        Ok(task)
    }

    pub fn remove(&mut self, id: &str) -> Result<Task, TaskError> {
        let position = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| TaskError::NotFound(id.to_owned()))?;
        Ok(self.tasks.remove(position))
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn stats(&self) -> TaskStats {
        let total = self.tasks.len();
        let completed = self.tasks.iter().filter(|task| task.completed).count();
        let percentage = if total > 0 {
            (completed as f64 / total as f64 * 100.0).round() as u8
        } else {
            0
        };

        TaskStats {
            total,
            completed,
            pending: total - completed,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn deadline_is_truncated_to_milliseconds() {
        let precise = now() + TimeDelta::nanoseconds(1_234_567);
        let deadline = TaskDeadline::new(precise);

        assert_eq!(deadline.timestamp_millis(), now().timestamp_millis() + 1);
        assert_eq!(deadline.time().nanosecond(), 1_000_000);
    }

    #[test]
    fn remaining_time_is_rendered_by_largest_unit() {
        let render = |delta| Remaining(delta).to_string();

        assert_eq!(render(TimeDelta::hours(26) + TimeDelta::minutes(5)), "1d 2h");
        assert_eq!(render(TimeDelta::hours(3) + TimeDelta::minutes(7)), "3h 7m");
        assert_eq!(render(TimeDelta::minutes(42)), "42m");
        assert_eq!(render(TimeDelta::seconds(30)), "0m");
    }

    #[test]
    fn deadline_status_marks_last_hour_as_urgent() {
        let task = Task::new("1", "Ship it").with_deadline(now() + TimeDelta::minutes(59));

        let status = task.deadline_status(now());

        assert_eq!(
            status,
            DeadlineStatus::Due {
                remaining: Remaining(TimeDelta::minutes(59)),
                urgent: true
            }
        );
    }

    #[test]
    fn deadline_status_reports_overdue_and_ignores_completed() {
        let mut task = Task::new("1", "Ship it").with_deadline(now() - TimeDelta::minutes(1));
        assert_eq!(task.deadline_status(now()), DeadlineStatus::Overdue);

        task.completed = true;
        assert_eq!(task.deadline_status(now()), DeadlineStatus::None);
        assert_eq!(Task::new("2", "No deadline").deadline_status(now()), DeadlineStatus::None);
    }

    #[test]
    fn added_tasks_get_unique_ids_and_go_first() {
        let mut list = TaskList::default();
        list.add("first", None, now());
        list.add("second", Some(now()), now());

        let ids: Vec<_> = list.tasks().iter().map(|task| task.id.clone()).collect();
        let millis = now().timestamp_millis();
        assert_eq!(ids, vec![(millis + 1).to_string(), millis.to_string()]);
        assert_eq!(list.tasks()[0].text, "second");
    }

    #[test]
    fn toggle_and_remove_report_missing_tasks() {
        let mut list = TaskList::new(vec![Task::new("1", "a")]);

        assert!(list.toggle("1").unwrap().completed);
        assert!(!list.toggle("1").unwrap().completed);
        assert_eq!(list.toggle("2").unwrap_err(), TaskError::NotFound("2".into()));

        assert_eq!(list.remove("1").unwrap().text, "a");
        assert_eq!(list.remove("1").unwrap_err(), TaskError::NotFound("1".into()));
    }

    #[test]
    fn stats_round_percentage() {
        let mut done = Task::new("1", "a");
        done.completed = true;
        let mut done_too = Task::new("2", "b");
        done_too.completed = true;
        let list = TaskList::new(vec![done, done_too, Task::new("3", "c")]);

        let stats = list.stats();

        assert_eq!(
            stats,
            TaskStats {
                total: 3,
                completed: 2,
                pending: 1,
                percentage: 67
            }
        );
        assert_eq!(TaskList::default().stats().percentage, 0);
    }

    #[test]
    fn malformed_deadlines_deserialize_as_none() {
        let tasks: Vec<Task> = serde_json::from_str(
            r#"[
                {"id": "1", "text": "iso", "deadline": "2025-05-31T13:00:00Z"},
                {"id": "2", "text": "millis", "deadline": 1748696400000},
                {"id": "3", "text": "garbage", "deadline": "tomorrow-ish"},
                {"text": "no id", "completed": true}
            ]"#,
        )
        .unwrap();

        let expected = TaskDeadline::new(Utc.with_ymd_and_hms(2025, 5, 31, 13, 0, 0).unwrap());
        assert_eq!(tasks[0].deadline, Some(expected));
        assert_eq!(tasks[1].deadline, Some(expected));
        assert_eq!(tasks[2].deadline, None);
        assert_eq!(tasks[3].id, "");
        assert!(tasks[3].completed);
    }
}
