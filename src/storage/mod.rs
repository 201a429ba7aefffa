mod model;
mod reminder_ledger;
mod task_store;

pub use model::{ReminderKey, TrackerState};
pub use reminder_ledger::{InMemoryReminderLedger, JsonFileReminderLedger, ReminderLedger};
pub use task_store::TaskStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Unsupported schema version {found}, expected 1..={supported}")]
    SchemaVersion { found: u32, supported: u32 },
}
