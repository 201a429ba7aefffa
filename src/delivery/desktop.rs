use std::sync::Arc;

use super::{LocalNotification, NotificationEmitter};

pub struct NoopNotifier;

impl NotificationEmitter for NoopNotifier {
    fn is_available(&self) -> bool {
        false
    }

    fn show(&self, _notification: &LocalNotification) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
pub struct DesktopNotifier {
    app_name: String,
}

#[cfg(target_os = "linux")]
impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

#[cfg(target_os = "linux")]
impl NotificationEmitter for DesktopNotifier {
    fn is_available(&self) -> bool {
        true
    }

    fn show(&self, notification: &LocalNotification) -> anyhow::Result<()> {
        notify_rust::Notification::new()
            .appname(&self.app_name)
            .summary(&notification.title)
            .body(&notification.body)
            .show()?;
        Ok(())
    }
}

pub fn notifier_for(enabled: bool, app_name: &str) -> Arc<dyn NotificationEmitter> {
    if !enabled {
        log::info!("Local notifications are disabled");
        return Arc::new(NoopNotifier);
    }

    platform_notifier(app_name)
}

#[cfg(target_os = "linux")]
fn platform_notifier(app_name: &str) -> Arc<dyn NotificationEmitter> {
    Arc::new(DesktopNotifier::new(app_name))
}

#[cfg(not(target_os = "linux"))]
fn platform_notifier(_app_name: &str) -> Arc<dyn NotificationEmitter> {
    log::info!("Local notifications are not supported on this platform");
    Arc::new(NoopNotifier)
}
