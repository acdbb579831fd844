//! # mood-core
//!
//! Core types and traits for the moodring server.
//!
//! This crate provides:
//! - `BillingProvider` trait and `start_checkout` for subscription checkout
//! - `AuthProvider` trait and `resolve_callback` for the login callback
//! - `PlanCatalog` for the pricing page
//! - `MoodError` for typed error handling
//!
//! Both flows are plain async functions over an injected provider, so they
//! can be exercised without any network access.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mood_core::{start_checkout, resolve_callback, AuthCode, CheckoutRequest, CheckoutUrls};
//!
//! // Checkout: one provider call, URL out
//! let request = CheckoutRequest::new("u1", "price_abc");
//! let session = start_checkout(billing.as_ref(), &request, &urls, None).await?;
//! // Respond with session.url
//!
//! // Callback: always ends in a redirect
//! let outcome = resolve_callback(auth.as_ref(), Some(AuthCode::new(code)), verifier).await;
//! let location = paths.location(&outcome);
//! ```

pub mod auth;
pub mod billing;
pub mod callback;
pub mod error;
pub mod plan;

// Re-exports for convenience
pub use auth::{AuthCode, AuthProvider, AuthSession, AuthUser, BoxedAuthProvider};
pub use billing::{
    start_checkout, BillingProvider, BoxedBillingProvider, CheckoutRequest, CheckoutSession,
    CheckoutUrls, WebhookEvent, WebhookEventType,
};
pub use callback::{resolve_callback, CallbackOutcome, RedirectPaths, AUTH_FAILED};
pub use error::{MoodError, MoodResult};
pub use plan::{BillingInterval, Currency, Plan, PlanCatalog, Price};
