use std::path::{Path, PathBuf};

use super::{
    StoreError,
    model::{StoredState, TrackerState},
};

const STATE_SCHEMA_VERSION: u32 = 1;

/// Tasks and recipient emails kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<TrackerState, StoreError> {
        if !self.path.exists() {
            return Ok(TrackerState::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let stored: StoredState = serde_json::from_str(&content)?;

        if !(1..=STATE_SCHEMA_VERSION).contains(&stored.schema_version) {
            return Err(StoreError::SchemaVersion {
                found: stored.schema_version,
                supported: STATE_SCHEMA_VERSION,
            });
        }

        Ok(stored.state)
    }

    /// `load` on the blocking pool, for callers inside the runtime.
    pub async fn load_async(&self) -> anyhow::Result<TrackerState> {
        let store = self.clone();
        let state = tokio::task::spawn_blocking(move || store.load()).await??;
        Ok(state)
    }

    pub fn save(&self, state: &TrackerState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let stored = StoredState {
            schema_version: STATE_SCHEMA_VERSION,
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, content)?;

        Ok(())
    }

    pub fn update<T>(
        &self,
        change: impl FnOnce(&mut TrackerState) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut state = self.load()?;
        let result = change(&mut state)?;
        self.save(&state)?;
        Ok(result)
    }
}
