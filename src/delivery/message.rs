use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::task::Task;

use super::{EmailMessage, LocalNotification};

pub const REMINDER_TITLE: &str = "Task Reminder";

const DEADLINE_FORMAT: &str = "%b %-d, %Y %H:%M %Z";

#[derive(Debug, Clone)]
pub struct MessageComposer {
    from_name: String,
    timezone: Tz,
}

impl MessageComposer {
    pub fn new(from_name: impl Into<String>, timezone: Tz) -> Self {
        Self {
            from_name: from_name.into(),
            timezone,
        }
    }

    pub fn reminder_notification(&self, task: &Task) -> LocalNotification {
        LocalNotification {
            title: REMINDER_TITLE.to_owned(),
            body: format!(
                "Task \"{}\" is due soon! Deadline: {}",
                task.text,
                self.deadline_text(task)
            ),
        }
    }

    pub fn reminder_email(&self, task: &Task, recipient: &str) -> EmailMessage {
        let body = format!(
            "Hello!

This is a reminder about your task:

Task: {}
Deadline: {}

Don't forget to complete it on time!

Best regards,
{}",
            task.text,
            self.deadline_text(task),
            self.from_name
        );

        EmailMessage {
            recipient: recipient.to_owned(),
            from_name: self.from_name.clone(),
            subject: format!("{REMINDER_TITLE}: {}", task.text),
            body,
        }
    }

    pub fn test_email(&self, recipient: &str, now: DateTime<Utc>) -> EmailMessage {
        let body = format!(
            "Hello!

This is a test email from {name}.

Task: This is a test task
Deadline: {}

If you received this email, your email reminders are working correctly!

Best regards,
{name}",
            self.format_time(now),
            name = self.from_name
        );

        EmailMessage {
            recipient: recipient.to_owned(),
            from_name: self.from_name.clone(),
            subject: format!("Test Email from {}", self.from_name),
            body,
        }
    }

    fn deadline_text(&self, task: &Task) -> String {
        task.deadline
            .map(|deadline| self.format_time(*deadline.time()))
            .unwrap_or_else(|| "none".to_owned())
    }

    fn format_time(&self, time: DateTime<Utc>) -> String {
        time.with_timezone(&self.timezone)
            .format(DEADLINE_FORMAT)
            .to_string()
    }
}
