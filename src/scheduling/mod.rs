mod clock;
mod scheduler;
mod threshold;
mod watch;

pub use clock::{Clock, SystemClock};
pub use scheduler::{CHECK_INTERVAL, DeadlineScheduler, ReminderConfig, SchedulerOptions};
pub use threshold::{DeadlineCheck, REMINDER_THRESHOLD, check_deadline};
pub use watch::{ReminderCallback, watch_state};
