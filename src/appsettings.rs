use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{delivery::WEB3FORMS_ENDPOINT, scheduling::SchedulerOptions};

#[derive(Deserialize, Debug, Clone)]
pub struct ReminderSettings {
    pub check_interval_secs: u64,
    pub threshold_secs: i64,
    pub prune_stale_entries: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EmailSettings {
    pub endpoint: String,
    pub access_key: Option<String>,
    pub from_name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NotificationSettings {
    pub enabled: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    pub state_path: PathBuf,
    pub ledger_path: PathBuf,
    pub reload_interval_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub timezone: String,
    pub reminders: ReminderSettings,
    pub email: EmailSettings,
    pub notifications: NotificationSettings,
    pub storage: StorageSettings,
}

impl AppSettings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("timezone", "UTC")?
            .set_default("reminders.check_interval_secs", 60)?
            .set_default("reminders.threshold_secs", 3600)?
            .set_default("reminders.prune_stale_entries", true)?
            .set_default("email.endpoint", WEB3FORMS_ENDPOINT)?
            .set_default("email.from_name", "Velvet Tasks")?
            .set_default("notifications.enabled", true)?
            .set_default("storage.state_path", "taskminder/state.json")?
            .set_default("storage.ledger_path", "taskminder/reminders.json")?
            .set_default("storage.reload_interval_secs", 5)
    }

    pub fn timezone(&self) -> anyhow::Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("Invalid timezone {:?}", self.timezone))
    }

    pub fn scheduler_options(&self) -> anyhow::Result<SchedulerOptions> {
        let threshold = TimeDelta::try_seconds(self.reminders.threshold_secs)
            .filter(|threshold| *threshold > TimeDelta::zero())
            .with_context(|| {
                format!(
                    "Invalid reminders.threshold_secs {}",
                    self.reminders.threshold_secs
                )
            })?;

        Ok(SchedulerOptions {
            check_interval: Duration::from_secs(self.reminders.check_interval_secs.max(1)),
            threshold,
            prune_stale_entries: self.reminders.prune_stale_entries,
        })
    }

    pub fn access_key(&self) -> Option<&str> {
        self.email
            .access_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reminder_constants() {
        let settings: AppSettings = AppSettings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let options = settings.scheduler_options().unwrap();

        assert_eq!(options.check_interval, crate::scheduling::CHECK_INTERVAL);
        assert_eq!(options.threshold, crate::scheduling::REMINDER_THRESHOLD);
        assert_eq!(settings.timezone().unwrap(), chrono_tz::UTC);
        assert_eq!(settings.access_key(), None);
        assert_eq!(settings.email.endpoint, WEB3FORMS_ENDPOINT);
    }

    #[test]
    fn out_of_range_threshold_is_reported() {
        for threshold_secs in [i64::MAX, 0, -60] {
            let settings: AppSettings = AppSettings::defaults()
                .unwrap()
                .set_override("reminders.threshold_secs", threshold_secs)
                .unwrap()
                .build()
                .unwrap()
                .try_deserialize()
                .unwrap();

            assert!(settings.scheduler_options().is_err(), "threshold_secs = {threshold_secs}");
        }
    }

    #[test]
    fn invalid_timezone_is_reported() {
        let settings: AppSettings = AppSettings::defaults()
            .unwrap()
            .set_override("timezone", "Mars/Olympus")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(settings.timezone().is_err());
    }
}
