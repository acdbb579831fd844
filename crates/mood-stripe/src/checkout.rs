//! # Stripe Checkout Sessions
//!
//! Subscription checkout through Stripe's hosted Checkout page.

use crate::config::StripeConfig;
use crate::signature::verify_signature;
use crate::PROVIDER;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mood_core::{
    BillingProvider, CheckoutRequest, CheckoutSession, CheckoutUrls, MoodError, MoodResult,
    WebhookEvent, WebhookEventType,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

/// Stripe subscription checkout
///
/// Uses Stripe's hosted checkout page, so card data never reaches us.
pub struct StripeBilling {
    config: StripeConfig,
    client: Client,
}

impl StripeBilling {
    /// Create a new Stripe billing provider
    pub fn new(config: StripeConfig) -> MoodResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MoodError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> MoodResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Form fields for `POST /v1/checkout/sessions`
    fn session_form(request: &CheckoutRequest, urls: &CheckoutUrls) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", request.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", urls.success_url()),
            ("cancel_url", urls.cancel_url()),
            ("client_reference_id", request.user_id.clone()),
            ("metadata[userId]", request.user_id.clone()),
            ("subscription_data[metadata][userId]", request.user_id.clone()),
        ]
    }

    /// Translate a non-2xx Stripe response into our error type
    fn map_error_response(status: StatusCode, retry_after: Option<u64>, body: &str) -> MoodError {
        let parsed = serde_json::from_str::<StripeErrorResponse>(body).ok();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return MoodError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after_secs: retry_after.unwrap_or(1),
            };
        }

        match parsed {
            Some(resp) if status.is_client_error() && resp.error.error_type == "invalid_request_error" => {
                MoodError::InvalidRequest(resp.error.message)
            }
            Some(resp) => MoodError::ProviderError {
                provider: PROVIDER.to_string(),
                message: resp.error.message,
            },
            None => MoodError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }
}

#[async_trait]
impl BillingProvider for StripeBilling {
    #[instrument(skip(self, request, urls, idempotency_key), fields(user_id = %request.user_id))]
    async fn create_subscription_checkout(
        &self,
        request: &CheckoutRequest,
        urls: &CheckoutUrls,
        idempotency_key: Option<&str>,
    ) -> MoodResult<CheckoutSession> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let form = Self::session_form(request, urls);

        debug!("Creating Stripe checkout session: price={}", request.price_id);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(&form);

        if let Some(key) = idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MoodError::from_transport(PROVIDER, e.is_timeout(), e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response
            .text()
            .await
            .map_err(|e| MoodError::from_transport(PROVIDER, e.is_timeout(), e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);
            return Err(Self::map_error_response(status, retry_after, &body));
        }

        let session: StripeCheckoutSessionResponse = serde_json::from_str(&body).map_err(|e| {
            MoodError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        let url = session.url.ok_or_else(|| MoodError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("Checkout session {} has no URL", session.id),
        })?;

        info!("Created Stripe checkout session: id={}", session.id);

        Ok(CheckoutSession {
            session_id: session.id,
            provider: PROVIDER.to_string(),
            url,
            expires_at: session
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> MoodResult<WebhookEvent> {
        verify_signature(
            payload,
            signature,
            &self.config.webhook_secret,
            Utc::now().timestamp(),
        )?;

        let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            MoodError::WebhookParseError(format!("Failed to parse webhook: {}", e))
        })?;

        debug!("Verified Stripe webhook: type={}", event.event_type);

        let event_type = match event.event_type.as_str() {
            "checkout.session.completed" => WebhookEventType::CheckoutCompleted,
            "customer.subscription.created" => WebhookEventType::SubscriptionCreated,
            "customer.subscription.updated" => WebhookEventType::SubscriptionUpdated,
            "customer.subscription.deleted" => WebhookEventType::SubscriptionDeleted,
            "invoice.paid" => WebhookEventType::InvoicePaid,
            "invoice.payment_failed" => WebhookEventType::InvoicePaymentFailed,
            other => WebhookEventType::Unknown(other.to_string()),
        };

        let object = &event.data.object;
        let str_field = |key: &str| object.get(key).and_then(|v| v.as_str()).map(String::from);

        let user_id = object
            .get("metadata")
            .and_then(|m| m.get("userId"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| str_field("client_reference_id"));

        if user_id.is_none() && event_type == WebhookEventType::CheckoutCompleted {
            warn!("Checkout completed without a userId: event={}", event.id);
        }

        // Subscription objects carry their own id; sessions and invoices reference one
        let subscription_id = match event_type {
            WebhookEventType::SubscriptionCreated
            | WebhookEventType::SubscriptionUpdated
            | WebhookEventType::SubscriptionDeleted => str_field("id"),
            _ => str_field("subscription"),
        };

        Ok(WebhookEvent {
            event_id: event.id,
            event_type,
            provider: PROVIDER.to_string(),
            user_id,
            customer_id: str_field("customer"),
            subscription_id,
            raw_data: Some(serde_json::Value::Object(event.data.object)),
            timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}
