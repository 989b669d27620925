//! Stripe payment intents over the REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{NewIntent, PaymentGateway, PaymentIntent};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Stripe client authenticated with the account's secret key.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("arkaba-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn parse_intent(response: Response) -> Result<PaymentIntent, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<PaymentIntent>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<StripeErrorBody>(&body)
            .ok()
            .map(|b| b.error);
        let message = detail
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| format!("HTTP {}", status));

        tracing::warn!(
            status = %status,
            code = detail.as_ref().and_then(|e| e.code.as_deref()).unwrap_or(""),
            "Stripe request failed: {}",
            message
        );

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Payment not found: {}", message)));
        }
        Err(AppError::Payment(message))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, intent: &NewIntent<'_>) -> Result<PaymentIntent, AppError> {
        let amount = intent.amount_cents.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("amount", amount.as_str()),
            ("currency", intent.currency),
            ("automatic_payment_methods[enabled]", "true"),
            ("description", intent.description.as_str()),
            ("metadata[kind]", intent.purpose.as_str()),
            ("metadata[id]", intent.target_id),
        ];
        if let Some(email) = intent.receipt_email {
            form.push(("receipt_email", email));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let created = Self::parse_intent(response).await?;
        tracing::info!(
            payment_intent_id = %created.id,
            kind = intent.purpose.as_str(),
            target_id = intent.target_id,
            amount = created.amount,
            "Payment intent created"
        );
        Ok(created)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, AppError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::Validation("Malformed payment intent id".to_string()));
        }

        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{}", self.api_base, id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::parse_intent(response).await
    }
}
