//! # mood-stripe
//!
//! Stripe subscription billing for the moodring server.
//!
//! `StripeBilling` implements `mood_core::BillingProvider` on top of the
//! Checkout Sessions API in subscription mode:
//! - one line item per checkout, referencing a dashboard-defined price id
//! - our user id attached as `client_reference_id` and metadata
//! - webhook signature verification for fulfillment events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mood_stripe::StripeBilling;
//! use mood_core::{start_checkout, CheckoutRequest, CheckoutUrls};
//!
//! let billing = StripeBilling::from_env()?;
//! let request = CheckoutRequest::new("u1", "price_plus_monthly");
//! let session = start_checkout(&billing, &request, &CheckoutUrls::new("https://moodring.app"), None).await?;
//!
//! // Redirect the browser to session.url
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use mood_stripe::{dispatch_webhook_event, SubscriptionEventData, WebhookHandler};
//!
//! struct Entitlements;
//!
//! impl WebhookHandler for Entitlements {
//!     fn on_checkout_completed(&self, data: SubscriptionEventData) -> MoodResult<()> {
//!         // Mark data.user_id as subscribed
//!         Ok(())
//!     }
//! }
//!
//! let event = billing.verify_webhook(payload, signature).await?;
//! dispatch_webhook_event(&Entitlements, event)?;
//! ```

pub mod checkout;
pub mod config;
pub mod signature;
pub mod webhook;

// Re-exports
pub use checkout::StripeBilling;
pub use config::StripeConfig;
pub use webhook::{
    dispatch_webhook_event, LoggingWebhookHandler, SubscriptionEventData, WebhookHandler,
    REQUIRED_WEBHOOK_EVENTS,
};

/// Provider name used in errors, logs and webhook routing
pub const PROVIDER: &str = "stripe";
