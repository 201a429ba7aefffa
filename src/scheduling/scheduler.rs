use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
    time::Duration,
};

use chrono::TimeDelta;
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    delivery::{DispatchRequest, DispatchSink},
    storage::{ReminderKey, ReminderLedger},
    task::{Task, TaskId},
};

use super::{
    clock::{Clock, SystemClock},
    threshold::{DeadlineCheck, REMINDER_THRESHOLD, check_deadline},
};

pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub check_interval: Duration,
    pub threshold: TimeDelta,
    /// Drop ledger entries of tasks missing from the snapshot on every `start`.
    pub prune_stale_entries: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            check_interval: CHECK_INTERVAL,
            threshold: REMINDER_THRESHOLD,
            prune_stale_entries: false,
        }
    }
}

/// Snapshot a scheduling session works from. Replaced wholesale on every `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderConfig {
    pub emails: BTreeSet<String>,
    pub tasks: Vec<Task>,
}

struct ScheduledTask {
    task_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl ScheduledTask {
    fn stop(&self) {
        self.cancellation_token.cancel();
    }

    async fn cancel(self, timeout: Duration) {
        self.cancellation_token.cancel();

        let mut task_handle = self.task_handle;
        if time::timeout(timeout, &mut task_handle).await.is_err() {
            log::warn!("Reminder pass did not stop in time, aborting. [timeout = {timeout:?}]");
            task_handle.abort();
        }
    }
}

/// Periodic deadline checker.
///
/// `start` runs one pass immediately and then one every check interval, always
/// against the snapshot it was started with. Reminders are handed to the
/// [`DispatchSink`] without waiting for delivery, and every (task, deadline) pair
/// is recorded in the [`ReminderLedger`] so it is reminded at most once.
pub struct DeadlineScheduler {
    ledger: Arc<dyn ReminderLedger>,
    dispatch: DispatchSink,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
    running: Option<ScheduledTask>,
}

impl DeadlineScheduler {
    pub fn new(ledger: Arc<dyn ReminderLedger>, dispatch: DispatchSink) -> Self {
        Self {
            ledger,
            dispatch,
            clock: Arc::new(SystemClock),
            options: SchedulerOptions::default(),
            running: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub async fn start<F>(&mut self, config: ReminderConfig, on_reminder: F)
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        if let Some(previous) = self.running.take() {
            previous.cancel(CANCEL_TIMEOUT).await;
        }

        log::info!(
            "Reminder scheduler started. [emails = {}, tasks = {}, interval = {:?}]",
            config.emails.len(),
            config.tasks.len(),
            self.options.check_interval
        );

        let pass = ReminderPass {
            config,
            ledger: Arc::clone(&self.ledger),
            dispatch: self.dispatch.clone(),
            clock: Arc::clone(&self.clock),
            threshold: self.options.threshold,
            on_reminder: Box::new(on_reminder),
        };

        if self.options.prune_stale_entries {
            pass.prune_ledger().await;
        }

        pass.run().await;

        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();
        let period = self.options.check_interval;
        let task_handle = tokio::spawn(async move {
            run_ticks(pass, period, task_cancellation_token).await;
        });

        self.running = Some(ScheduledTask {
            task_handle,
            cancellation_token,
        });
    }

    /// Disarms the timer. A pass already in progress finishes, including its dispatches.
    pub fn stop(&mut self) {
        if let Some(task) = self.running.take() {
            task.stop();
            log::info!("Reminder scheduler stopped");
        }
    }
}

impl Drop for DeadlineScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_ticks(pass: ReminderPass, period: Duration, cancellation_token: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                log::debug!("Reminder tick loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                pass.run().await;
            }
        }
    }
}

struct ReminderPass {
    config: ReminderConfig,
    ledger: Arc<dyn ReminderLedger>,
    dispatch: DispatchSink,
    clock: Arc<dyn Clock>,
    threshold: TimeDelta,
    on_reminder: Box<dyn Fn(&Task) + Send + Sync>,
}

impl ReminderPass {
    async fn run(&self) {
        let now = self.clock.now();
        let ReminderConfig { emails, tasks } = &self.config;

        if emails.is_empty() {
            log::warn!("No recipient emails configured, skipping reminder check");
            return;
        }

        let tracked = tasks
            .iter()
            .filter(|task| !task.completed && task.deadline.is_some())
            .count();
        log::debug!("Checking tasks for reminders. [tracked = {tracked}, now = {now}]");

        for task in tasks {
            match check_deadline(task, now, self.threshold) {
                DeadlineCheck::InWindow { remaining } => self.remind(task, remaining).await,
                DeadlineCheck::NotYetDue { remaining } => {
                    log::trace!(
                        "Task not due yet. [task_id = {}, remaining_min = {}]",
                        task.id,
                        remaining.num_minutes()
                    );
                }
                DeadlineCheck::Passed | DeadlineCheck::Ineligible => {}
            }
        }
    }

    async fn remind(&self, task: &Task, remaining: TimeDelta) {
        let Some(key) = ReminderKey::for_task(task) else {
            return;
        };

        let already_sent = match self.ledger.has_sent(&key).await {
            Ok(sent) => sent,
            Err(err) => {
                // An unreadable ledger may cause a duplicate reminder, never a missed one.
                log::warn!(
                    "Reminder ledger unavailable, treating reminder as unsent. [key = {}, error = {:#}]",
                    key,
                    err
                );
                false
            }
        };

        if already_sent {
            log::debug!("Reminder already sent. [task_id = {}]", task.id);
            return;
        }

        log::info!(
            "Sending reminder. [task_id = {}, recipients = {}, remaining_min = {}]",
            task.id,
            self.config.emails.len(),
            remaining.num_minutes()
        );

        self.dispatch.dispatch(DispatchRequest {
            task: task.clone(),
            recipients: self.config.emails.iter().cloned().collect(),
        });

        // Marked regardless of delivery outcome: at most once per deadline, no retries.
        if let Err(err) = self.ledger.mark_sent(key).await {
            log::error!(
                "Could not record sent reminder. [task_id = {}, error = {:#}]",
                task.id,
                err
            );
        }

        (self.on_reminder)(task);
    }

    async fn prune_ledger(&self) {
        let task_ids: HashSet<TaskId> = self
            .config
            .tasks
            .iter()
            .map(|task| task.id.clone())
            .collect();

        match self.ledger.retain_tasks(&task_ids).await {
            Ok(0) => {}
            Ok(removed) => log::info!("Pruned stale reminder entries. [removed = {removed}]"),
            Err(err) => log::warn!("Could not prune reminder ledger. [error = {:#}]", err),
        }
    }
}
