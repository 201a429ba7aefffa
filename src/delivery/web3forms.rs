use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;

use super::{EmailError, EmailMessage, EmailTransport};

pub const WEB3FORMS_ENDPOINT: &str = "https://api.web3forms.com/submit";

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Sends email through the Web3Forms form relay.
pub struct Web3FormsTransport {
    client: reqwest::Client,
    endpoint: String,
    access_key: String,
}

impl Web3FormsTransport {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self::with_endpoint(WEB3FORMS_ENDPOINT, access_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
        }
    }
}

#[async_trait]
impl EmailTransport for Web3FormsTransport {
    async fn submit(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let form = Form::new()
            .text("access_key", self.access_key.clone())
            .text("name", message.from_name.clone())
            .text("from_name", message.from_name.clone())
            .text("email", message.recipient.clone())
            .text("subject", message.subject.clone())
            .text("message", message.body.clone());

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<SubmitResponse>(&body) {
            Ok(SubmitResponse { success: true, .. }) => Ok(()),
            Ok(SubmitResponse { message, .. }) => Err(EmailError::Rejected(
                message.unwrap_or_else(|| "Unknown error".to_owned()),
            )),
            Err(_) => Err(EmailError::UnexpectedResponse { status, body }),
        }
    }
}

/// Stand-in used when no access key is configured. Every submission fails with a diagnostic.
pub struct UnconfiguredTransport;

#[async_trait]
impl EmailTransport for UnconfiguredTransport {
    async fn submit(&self, _message: &EmailMessage) -> Result<(), EmailError> {
        Err(EmailError::NotConfigured(
            "set email.access_key to enable email reminders".to_owned(),
        ))
    }
}
