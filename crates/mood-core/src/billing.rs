//! # Billing
//!
//! Subscription checkout types and the billing provider trait.
//!
//! ## Design Pattern
//!
//! The payments provider is an injected capability. Handlers receive a
//! `BoxedBillingProvider` from application state and hand it to
//! [`start_checkout`], which makes exactly one provider call.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  BillingProvider (trait)                    │
//! │  ├── create_subscription_checkout()                         │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                 ┌──────────┴──────────┐
//!         ┌───────┴───────┐     ┌───────┴───────┐
//!         │ StripeBilling │     │  test fakes   │
//!         └───────────────┘     └───────────────┘
//! ```

use crate::error::{MoodError, MoodResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// A request to start a subscription checkout.
///
/// Both identifiers are opaque. The price id is not checked locally; the
/// payments provider decides whether it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Our user id, attached to the session as metadata for reconciliation
    pub user_id: String,
    /// Provider-defined price id of the plan
    pub price_id: String,
}

impl CheckoutRequest {
    pub fn new(user_id: impl Into<String>, price_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            price_id: price_id.into(),
        }
    }

    /// Build from optional fields, rejecting absent or blank values.
    pub fn from_parts(user_id: Option<String>, price_id: Option<String>) -> MoodResult<Self> {
        let user_id = present(user_id, "userId")?;
        let price_id = present(price_id, "priceId")?;
        Ok(Self { user_id, price_id })
    }

    /// Check that both fields are present.
    pub fn validate(&self) -> MoodResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(missing("userId"));
        }
        if self.price_id.trim().is_empty() {
            return Err(missing("priceId"));
        }
        Ok(())
    }
}

fn present(value: Option<String>, field: &str) -> MoodResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(missing(field)),
    }
}

fn missing(field: &str) -> MoodError {
    MoodError::InvalidRequest(format!("Missing required field: {}", field))
}

/// A hosted checkout session created by the payments provider.
///
/// We only ever forward `url`; the session itself lives at the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub session_id: String,

    /// Provider name (e.g., "stripe")
    pub provider: String,

    /// URL to redirect the customer to
    pub url: String,

    /// When the hosted page stops accepting payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(
        session_id: impl Into<String>,
        provider: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            provider: provider.into(),
            url: url.into(),
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Check if the hosted page is still usable
    pub fn is_active(&self) -> bool {
        self.expires_at.map(|exp| exp > Utc::now()).unwrap_or(true)
    }
}

/// Return URLs handed to the provider for a checkout
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Public base URL of the site (e.g., "https://moodring.app")
    pub base_url: String,
    /// Page shown after a completed purchase
    pub success_path: String,
    /// Page shown when the customer backs out
    pub cancel_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            success_path: "/dashboard?checkout=success".to_string(),
            cancel_path: "/pricing?checkout=cancelled".to_string(),
        }
    }

    /// Success URL with the provider's session id placeholder appended
    pub fn success_url(&self) -> String {
        let url = format!("{}{}", self.base_url, self.success_path);
        if url.contains('?') {
            format!("{}&session_id={{CHECKOUT_SESSION_ID}}", url)
        } else {
            format!("{}?session_id={{CHECKOUT_SESSION_ID}}", url)
        }
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

/// Payments provider capability.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a hosted subscription checkout session.
    ///
    /// # Arguments
    /// * `request` - user and price to subscribe
    /// * `urls` - return URLs for success and cancel
    /// * `idempotency_key` - forwarded to the provider when the caller sent one
    ///
    /// Implementations make one call and never retry.
    async fn create_subscription_checkout(
        &self,
        request: &CheckoutRequest,
        urls: &CheckoutUrls,
        idempotency_key: Option<&str>,
    ) -> MoodResult<CheckoutSession>;

    /// Verify a webhook signature and parse the event.
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> MoodResult<WebhookEvent>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;

    /// Get the webhook endpoint path for this provider.
    fn webhook_path(&self) -> String {
        format!("/webhook/{}", self.provider_name())
    }
}

/// Shared billing provider handle
pub type BoxedBillingProvider = Arc<dyn BillingProvider>;

/// Start a subscription checkout.
///
/// Validates presence of both ids, then issues a single provider call. A
/// provider failure is returned unchanged; nothing is retried, since a retry
/// could open a second billable session.
#[instrument(skip(provider, request, urls, idempotency_key), fields(provider = provider.provider_name(), user_id = %request.user_id))]
pub async fn start_checkout(
    provider: &dyn BillingProvider,
    request: &CheckoutRequest,
    urls: &CheckoutUrls,
    idempotency_key: Option<&str>,
) -> MoodResult<CheckoutSession> {
    request.validate()?;

    info!(
        "Creating subscription checkout: price_id={}, idempotent={}",
        request.price_id,
        idempotency_key.is_some()
    );

    let session = provider
        .create_subscription_checkout(request, urls, idempotency_key)
        .await
        .map_err(|e| {
            error!("Checkout creation failed: {}", e);
            e
        })?;

    info!("Created checkout session: {}", session.session_id);
    Ok(session)
}

/// Webhook event types we care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Hosted checkout finished
    CheckoutCompleted,
    /// Subscription created
    SubscriptionCreated,
    /// Subscription changed (plan, status, cancel_at_period_end)
    SubscriptionUpdated,
    /// Subscription ended
    SubscriptionDeleted,
    /// Renewal invoice paid
    InvoicePaid,
    /// Renewal invoice failed
    InvoicePaymentFailed,
    /// Unknown event (passthrough)
    Unknown(String),
}

/// A verified, parsed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    /// Event type
    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// Our user id, recovered from checkout metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Provider customer id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    /// Provider subscription id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,

    /// Raw event object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}
