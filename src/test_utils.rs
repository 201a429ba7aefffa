use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::{
    delivery::{EmailError, EmailMessage, EmailTransport, LocalNotification, NotificationEmitter},
    scheduling::Clock,
    storage::{InMemoryReminderLedger, ReminderKey, ReminderLedger},
    task::TaskId,
};

#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<HashSet<String>>,
}

impl RecordingTransport {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Default::default(),
            failing: Arc::new(recipients.iter().map(|r| r.to_string()).collect()),
        }
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        let mut recipients: Vec<_> = self.messages().into_iter().map(|m| m.recipient).collect();
        recipients.sort();
        recipients
    }

    pub async fn wait_for(&self, count: usize) {
        for _ in 0..500 {
            if self.sent.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} submitted emails, got {}", self.sent.lock().unwrap().len());
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn submit(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message.clone());
        if self.failing.contains(&message.recipient) {
            return Err(EmailError::Rejected("mailbox unavailable".to_owned()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RecordingNotifier {
    available: bool,
    shown: Arc<Mutex<Vec<LocalNotification>>>,
}

impl RecordingNotifier {
    pub fn available() -> Self {
        Self {
            available: true,
            shown: Default::default(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            shown: Default::default(),
        }
    }

    pub fn shown(&self) -> Vec<LocalNotification> {
        self.shown.lock().unwrap().clone()
    }
}

impl NotificationEmitter for RecordingNotifier {
    fn is_available(&self) -> bool {
        self.available
    }

    fn show(&self, notification: &LocalNotification) -> anyhow::Result<()> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct CountingLedger {
    inner: Arc<InMemoryReminderLedger>,
    marks: Arc<AtomicUsize>,
}

impl CountingLedger {
    pub fn marks(&self) -> usize {
        self.marks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReminderLedger for CountingLedger {
    async fn has_sent(&self, key: &ReminderKey) -> anyhow::Result<bool> {
        self.inner.has_sent(key).await
    }

    async fn mark_sent(&self, key: ReminderKey) -> anyhow::Result<()> {
        self.marks.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_sent(key).await
    }

    async fn retain_tasks(&self, task_ids: &HashSet<TaskId>) -> anyhow::Result<usize> {
        self.inner.retain_tasks(task_ids).await
    }
}

pub struct FailingLedger;

#[async_trait]
impl ReminderLedger for FailingLedger {
    async fn has_sent(&self, _key: &ReminderKey) -> anyhow::Result<bool> {
        anyhow::bail!("ledger offline")
    }

    async fn mark_sent(&self, _key: ReminderKey) -> anyhow::Result<()> {
        anyhow::bail!("ledger offline")
    }

    async fn retain_tasks(&self, _task_ids: &HashSet<TaskId>) -> anyhow::Result<usize> {
        anyhow::bail!("ledger offline")
    }
}

/// Answers the first `has_sent` normally, then never returns.
#[derive(Default)]
pub struct StallingLedger {
    inner: InMemoryReminderLedger,
    reads: AtomicUsize,
}

impl StallingLedger {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReminderLedger for StallingLedger {
    async fn has_sent(&self, key: &ReminderKey) -> anyhow::Result<bool> {
        if self.reads.fetch_add(1, Ordering::SeqCst) > 0 {
            std::future::pending::<()>().await;
        }
        self.inner.has_sent(key).await
    }

    async fn mark_sent(&self, key: ReminderKey) -> anyhow::Result<()> {
        self.inner.mark_sent(key).await
    }

    async fn retain_tasks(&self, task_ids: &HashSet<TaskId>) -> anyhow::Result<usize> {
        self.inner.retain_tasks(task_ids).await
    }
}

/// Wall clock that moves with tokio's (possibly paused) time.
pub struct PausedClock {
    start: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl PausedClock {
    pub fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap(),
            origin: tokio::time::Instant::now(),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        self.start + TimeDelta::from_std(self.origin.elapsed()).unwrap()
    }
}
