//! Transactional email.
//!
//! Delivery goes through a `Mailer`. Without a relay configured, mail is
//! written to the log so local setups work without credentials.

mod templates;

pub use templates::*;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::errors::AppError;

/// A plain-text message ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), AppError>;
}

/// Writes mail to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Mail (not sent, no relay configured)");
        tracing::debug!(body = %email.text, "Mail body");
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    email: &'a Email,
}

/// Posts each message as JSON to an HTTP mail relay.
pub struct HttpRelayMailer {
    client: Client,
    relay_url: String,
    from: String,
}

impl HttpRelayMailer {
    pub fn new(relay_url: &str, from: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            relay_url: relay_url.to_string(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&RelayRequest {
                from: &self.from,
                email: &email,
            })
            .send()
            .await
            .map_err(|e| AppError::Mail(format!("Mail relay unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Mail(format!("Mail relay returned {}: {}", status, body)));
        }

        tracing::info!(to = %email.to, subject = %email.subject, "Mail sent");
        Ok(())
    }
}

/// Send mail that follows an already-committed change. Failure is logged only.
pub async fn send_best_effort(mailer: &dyn Mailer, email: Email) {
    let to = email.to.clone();
    if let Err(e) = mailer.send(email).await {
        tracing::warn!(to = %to, error = %e, "Failed to send notification mail");
    }
}
