use std::{sync::Arc, time::Duration};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    storage::{TaskStore, TrackerState},
    task::Task,
};

use super::scheduler::{DeadlineScheduler, ReminderConfig};

pub type ReminderCallback = Arc<dyn Fn(&Task) + Send + Sync>;

/// Keeps `scheduler` in step with the state file until `shutdown` fires.
///
/// The file is re-read every `reload_interval`; the scheduler is restarted only
/// when tasks or emails differ from the running snapshot. A failed reload keeps
/// the current snapshot.
pub async fn watch_state(
    store: TaskStore,
    mut scheduler: DeadlineScheduler,
    reload_interval: Duration,
    on_reminder: ReminderCallback,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut current = reminder_config(store.load_async().await?);
    restart(&mut scheduler, current.clone(), &on_reminder).await;

    let mut reload = time::interval_at(time::Instant::now() + reload_interval, reload_interval);
    reload.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = reload.tick() => {
                let next = match store.load_async().await {
                    Ok(state) => reminder_config(state),
                    Err(err) => {
                        log::warn!(
                            "Could not reload tracker state. [path = {}, error = {:#}]",
                            store.path().display(),
                            err
                        );
                        continue;
                    }
                };

                if next != current {
                    log::info!(
                        "Tracker state changed, restarting reminders. [tasks = {}, emails = {}]",
                        next.tasks.len(),
                        next.emails.len()
                    );
                    restart(&mut scheduler, next.clone(), &on_reminder).await;
                    current = next;
                }
            }
        }
    }

    scheduler.stop();
    Ok(())
}

async fn restart(
    scheduler: &mut DeadlineScheduler,
    config: ReminderConfig,
    on_reminder: &ReminderCallback,
) {
    let on_reminder = Arc::clone(on_reminder);
    scheduler.start(config, move |task| on_reminder(task)).await;
}

fn reminder_config(state: TrackerState) -> ReminderConfig {
    ReminderConfig {
        emails: state.emails,
        tasks: state.tasks,
    }
}
