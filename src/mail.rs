//! Outbound mail through the Resend HTTP API. The contact flow is the only
//! caller; a send failure is surfaced on the page and never touches stored
//! state.

use async_trait::async_trait;

use crate::config::MailConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()>;
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        let body = serde_json::json!({
            "from": mail.from,
            "to": [mail.to],
            "subject": mail.subject,
            "html": mail.html,
        });

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Mail(format!(
                "Resend returned {}",
                response.status()
            )))
        }
    }
}

/// Used when no API key is configured: logs the message instead of sending.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        tracing::warn!(
            "Mail delivery disabled, dropping message to {}: {}",
            mail.to,
            mail.subject
        );
        Err(AppError::Mail("mail delivery is not configured".to_string()))
    }
}

/// Build the mailer for the configured delivery setup.
pub fn build_mailer(config: &MailConfig) -> std::sync::Arc<dyn Mailer> {
    match &config.api_key {
        Some(key) => std::sync::Arc::new(ResendMailer::new(key.clone())),
        None => std::sync::Arc::new(DisabledMailer),
    }
}
