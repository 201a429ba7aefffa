use std::{
    collections::{BTreeSet, HashSet},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::task::TaskId;

use super::{
    StoreError,
    model::{ReminderKey, StoredLedger},
};

const LEDGER_SCHEMA_VERSION: u32 = 1;

/// Record of reminders that were already dispatched.
///
/// Each call is atomic on its own, but `has_sent` followed by `mark_sent` is not:
/// two schedulers sharing one ledger can both observe "not sent" for the same key.
#[async_trait]
pub trait ReminderLedger: Send + Sync {
    async fn has_sent(&self, key: &ReminderKey) -> anyhow::Result<bool>;

    async fn mark_sent(&self, key: ReminderKey) -> anyhow::Result<()>;

    /// Drops entries for tasks that are not in `task_ids`. Returns how many were removed.
    async fn retain_tasks(&self, task_ids: &HashSet<TaskId>) -> anyhow::Result<usize>;
}

#[derive(Default)]
pub struct InMemoryReminderLedger {
    sent: RwLock<HashSet<ReminderKey>>,
}

impl InMemoryReminderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry_count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait]
impl ReminderLedger for InMemoryReminderLedger {
    async fn has_sent(&self, key: &ReminderKey) -> anyhow::Result<bool> {
        Ok(self.sent.read().await.contains(key))
    }

    async fn mark_sent(&self, key: ReminderKey) -> anyhow::Result<()> {
        self.sent.write().await.insert(key);
        Ok(())
    }

    async fn retain_tasks(&self, task_ids: &HashSet<TaskId>) -> anyhow::Result<usize> {
        let mut sent = self.sent.write().await;
        let before = sent.len();
        sent.retain(|key| task_ids.contains(&key.task_id));
        Ok(before - sent.len())
    }
}

/// Ledger persisted as a JSON document. The whole file is rewritten on every change.
pub struct JsonFileReminderLedger {
    path: PathBuf,
    sent: Mutex<BTreeSet<ReminderKey>>,
}

impl JsonFileReminderLedger {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let sent = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let stored: StoredLedger = serde_json::from_str(&content)?;
                if !(1..=LEDGER_SCHEMA_VERSION).contains(&stored.schema_version) {
                    return Err(StoreError::SchemaVersion {
                        found: stored.schema_version,
                        supported: LEDGER_SCHEMA_VERSION,
                    });
                }
                stored.sent
            }
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeSet::new(),
            Err(err) => return Err(err.into()),
        };

        log::info!(
            "Opened reminder ledger. [path = {}, entries = {}]",
            path.display(),
            sent.len()
        );

        Ok(Self {
            path,
            sent: Mutex::new(sent),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, sent: &BTreeSet<ReminderKey>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let stored = StoredLedger {
            schema_version: LEDGER_SCHEMA_VERSION,
            sent: sent.clone(),
        };
        let content = serde_json::to_string_pretty(&stored)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        Ok(())
    }
}

#[async_trait]
impl ReminderLedger for JsonFileReminderLedger {
    async fn has_sent(&self, key: &ReminderKey) -> anyhow::Result<bool> {
        Ok(self.sent.lock().await.contains(key))
    }

    async fn mark_sent(&self, key: ReminderKey) -> anyhow::Result<()> {
        let mut sent = self.sent.lock().await;
        // Kept in memory even if the write fails.
        if sent.insert(key) {
            self.persist(&sent).await?;
        }
        Ok(())
    }

    async fn retain_tasks(&self, task_ids: &HashSet<TaskId>) -> anyhow::Result<usize> {
        let mut sent = self.sent.lock().await;
        let before = sent.len();
        sent.retain(|key| task_ids.contains(&key.task_id));
        let removed = before - sent.len();
        if removed > 0 {
            self.persist(&sent).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::task::TaskDeadline;

    use super::*;

    fn key(task_id: &str, hour: u32) -> ReminderKey {
        let deadline = Utc.with_ymd_and_hms(2025, 5, 31, hour, 0, 0).unwrap();
        ReminderKey::new(task_id, TaskDeadline::new(deadline))
    }

    #[tokio::test]
    async fn in_memory_ledger_tracks_exact_pairs() {
        let ledger = InMemoryReminderLedger::new();

        ledger.mark_sent(key("t1", 13)).await.unwrap();

        assert!(ledger.has_sent(&key("t1", 13)).await.unwrap());
        assert!(!ledger.has_sent(&key("t1", 14)).await.unwrap());
        assert!(!ledger.has_sent(&key("t2", 13)).await.unwrap());
    }

    #[tokio::test]
    async fn file_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        let ledger = JsonFileReminderLedger::open(&path).await.unwrap();
        ledger.mark_sent(key("t1", 13)).await.unwrap();
        drop(ledger);

        let reopened = JsonFileReminderLedger::open(&path).await.unwrap();
        assert!(reopened.has_sent(&key("t1", 13)).await.unwrap());
        assert!(!reopened.has_sent(&key("t1", 14)).await.unwrap());
    }

    #[tokio::test]
    async fn file_ledger_rejects_future_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, r#"{"schema_version": 99, "sent": []}"#).unwrap();

        let result = JsonFileReminderLedger::open(&path).await;

        assert!(matches!(
            result,
            Err(StoreError::SchemaVersion { found: 99, .. })
        ));
    }

    #[tokio::test]
    async fn retain_tasks_prunes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = JsonFileReminderLedger::open(&path).await.unwrap();
        ledger.mark_sent(key("t1", 13)).await.unwrap();
        ledger.mark_sent(key("t1", 14)).await.unwrap();
        ledger.mark_sent(key("gone", 13)).await.unwrap();

        let live = HashSet::from(["t1".to_owned()]);
        let removed = ledger.retain_tasks(&live).await.unwrap();

        assert_eq!(removed, 1);
        let reopened = JsonFileReminderLedger::open(&path).await.unwrap();
        assert!(reopened.has_sent(&key("t1", 14)).await.unwrap());
        assert!(!reopened.has_sent(&key("gone", 13)).await.unwrap());
    }
}
