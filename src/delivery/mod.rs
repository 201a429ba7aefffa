mod desktop;
mod dispatch;
mod message;
mod web3forms;

use async_trait::async_trait;

pub use desktop::{NoopNotifier, notifier_for};
#[cfg(target_os = "linux")]
pub use desktop::DesktopNotifier;
pub use dispatch::{DeliveryContext, DeliveryReport, DispatchRequest, DispatchSink, deliver};
pub use message::{MessageComposer, REMINDER_TITLE};
pub use web3forms::{UnconfiguredTransport, WEB3FORMS_ENDPOINT, Web3FormsTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient: String,
    pub from_name: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email transport is not configured: {0}")]
    NotConfigured(String),

    #[error("Email provider rejected the message: {0}")]
    Rejected(String),

    #[error("Unexpected email provider response ({status}): {body}")]
    UnexpectedResponse {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait EmailTransport: Send + Sync + 'static {
    async fn submit(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Local notifications are best effort: an unavailable emitter is skipped, never an error.
pub trait NotificationEmitter: Send + Sync + 'static {
    fn is_available(&self) -> bool;

    fn show(&self, notification: &LocalNotification) -> anyhow::Result<()>;
}
