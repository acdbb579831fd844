//! # Stripe Webhook Handling
//!
//! Subscription fulfillment runs off webhooks: checkout only hands the user a
//! URL, and Stripe tells us later whether the subscription actually started.
//! The `userId` attached at checkout time is how events are tied back to a user.

use mood_core::{MoodError, MoodResult, WebhookEvent, WebhookEventType};
use tracing::{debug, info, warn};

/// Subscription-related fields pulled out of a webhook event
#[derive(Debug, Clone)]
pub struct SubscriptionEventData {
    pub event_id: String,
    pub user_id: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    /// Subscription status (`active`, `past_due`, `canceled`, ...) when present
    pub status: Option<String>,
    /// `payment_status` of a completed checkout session
    pub payment_status: Option<String>,
}

impl SubscriptionEventData {
    /// Parse from a webhook event
    pub fn from_event(event: &WebhookEvent) -> MoodResult<Self> {
        let raw = event
            .raw_data
            .as_ref()
            .ok_or_else(|| MoodError::WebhookParseError("Missing raw data".to_string()))?;

        let obj = raw.as_object().ok_or_else(|| {
            MoodError::WebhookParseError("Raw data is not an object".to_string())
        })?;

        let str_field = |key: &str| obj.get(key).and_then(|v| v.as_str()).map(String::from);

        Ok(Self {
            event_id: event.event_id.clone(),
            user_id: event.user_id.clone(),
            customer_id: event.customer_id.clone(),
            subscription_id: event.subscription_id.clone(),
            status: str_field("status"),
            payment_status: str_field("payment_status"),
        })
    }

    /// Check if a completed checkout was paid
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

/// Webhook event handler trait
///
/// Implement this trait to react to subscription lifecycle events.
#[allow(unused_variables)]
pub trait WebhookHandler: Send + Sync {
    /// Called when a hosted checkout completes
    fn on_checkout_completed(&self, data: SubscriptionEventData) -> MoodResult<()> {
        info!(
            "Checkout completed: user={:?}, subscription={:?}, paid={}",
            data.user_id,
            data.subscription_id,
            data.is_paid()
        );
        Ok(())
    }

    fn on_subscription_created(&self, data: SubscriptionEventData) -> MoodResult<()> {
        info!(
            "Subscription created: user={:?}, subscription={:?}",
            data.user_id, data.subscription_id
        );
        Ok(())
    }

    fn on_subscription_updated(&self, data: SubscriptionEventData) -> MoodResult<()> {
        info!(
            "Subscription updated: subscription={:?}, status={:?}",
            data.subscription_id, data.status
        );
        Ok(())
    }

    fn on_subscription_deleted(&self, data: SubscriptionEventData) -> MoodResult<()> {
        info!(
            "Subscription ended: user={:?}, subscription={:?}",
            data.user_id, data.subscription_id
        );
        Ok(())
    }

    fn on_invoice_paid(&self, data: SubscriptionEventData) -> MoodResult<()> {
        info!("Invoice paid: subscription={:?}", data.subscription_id);
        Ok(())
    }

    fn on_invoice_payment_failed(&self, data: SubscriptionEventData) -> MoodResult<()> {
        warn!(
            "Invoice payment failed: customer={:?}, subscription={:?}",
            data.customer_id, data.subscription_id
        );
        Ok(())
    }

    /// Called for unknown/unhandled events
    fn on_unknown_event(&self, event: &WebhookEvent) -> MoodResult<()> {
        debug!("Unhandled webhook event: {:?}", event.event_type);
        Ok(())
    }
}

/// Default webhook handler (just logs events)
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

/// Dispatch a webhook event to the appropriate handler method
pub fn dispatch_webhook_event(handler: &dyn WebhookHandler, event: WebhookEvent) -> MoodResult<()> {
    if let WebhookEventType::Unknown(_) = event.event_type {
        return handler.on_unknown_event(&event);
    }

    let data = SubscriptionEventData::from_event(&event)?;
    match event.event_type {
        WebhookEventType::CheckoutCompleted => handler.on_checkout_completed(data),
        WebhookEventType::SubscriptionCreated => handler.on_subscription_created(data),
        WebhookEventType::SubscriptionUpdated => handler.on_subscription_updated(data),
        WebhookEventType::SubscriptionDeleted => handler.on_subscription_deleted(data),
        WebhookEventType::InvoicePaid => handler.on_invoice_paid(data),
        WebhookEventType::InvoicePaymentFailed => handler.on_invoice_payment_failed(data),
        WebhookEventType::Unknown(_) => handler.on_unknown_event(&event),
    }
}

/// Events that should be enabled on the Stripe webhook endpoint
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "invoice.paid",
    "invoice.payment_failed",
];
