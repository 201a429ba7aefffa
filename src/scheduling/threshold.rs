use chrono::{DateTime, TimeDelta, Utc};

use crate::task::Task;

/// How long before a deadline the reminder fires.
pub const REMINDER_THRESHOLD: TimeDelta = TimeDelta::hours(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineCheck {
    /// Completed, no deadline, or no usable id.
    Ineligible,
    /// Deadline is now or already behind us.
    Passed,
    InWindow { remaining: TimeDelta },
    NotYetDue { remaining: TimeDelta },
}

pub fn check_deadline(task: &Task, now: DateTime<Utc>, threshold: TimeDelta) -> DeadlineCheck {
    if task.completed || task.id.trim().is_empty() {
        return DeadlineCheck::Ineligible;
    }

    let Some(deadline) = task.deadline else {
        return DeadlineCheck::Ineligible;
    };

    let remaining = *deadline.time() - now;
    if remaining <= TimeDelta::zero() {
        DeadlineCheck::Passed
    } else if remaining <= threshold {
        DeadlineCheck::InWindow { remaining }
    } else {
        DeadlineCheck::NotYetDue { remaining }
    }
}
