use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::MercadoPagoConfig, error::AppError};

use super::preference::{PreferenceRequest, PreferenceResponse};

/// Thin client over the Mercado Pago REST API. Constructed once at startup
/// and shared through `AppState`; failures carry the upstream status code
/// and body text, and nothing here retries.
pub struct MercadoPagoClient {
    http: Client,
    base_url: String,
    access_token: String,
}

/// The slice of a gateway payment the reconciler cares about.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PaymentDetails {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub payment_type_id: Option<String>,
    pub transaction_amount: f64,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PaymentDetails {
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

impl MercadoPagoClient {
    pub fn new(http: Client, config: &MercadoPagoConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        }
    }

    /// Fetch full payment details for a webhook's `data.id`.
    pub async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("MercadoPago".into()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Payments API returned {status} for payment {payment_id}: {text}");
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse payment {payment_id}"))
    }

    /// Fetch a merchant order. Read-only; the webhook flow only logs these.
    pub async fn get_merchant_order(&self, merchant_order_id: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!(
                "{}/merchant_orders/{}",
                self.base_url, merchant_order_id
            ))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("MercadoPago".into()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Merchant orders API returned {status} for order {merchant_order_id}: {text}");
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse merchant order {merchant_order_id}"))
    }

    /// Create a checkout preference and return its redirect URLs.
    pub async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferenceResponse> {
        let response = self
            .http
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("MercadoPago".into()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Preferences API returned {status}: {text}");
        }

        response
            .json()
            .await
            .context("Failed to parse preference response")
    }
}
