//! # Request Handlers
//!
//! Axum request handlers. Each one pulls its provider out of `AppState` and
//! delegates to the flow functions in `mood-core`.

use crate::cookies::{expire_cookie, read_cookie, session_cookies};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use mood_core::{resolve_callback, start_checkout, AuthCode, CheckoutRequest, MoodError};
use mood_stripe::dispatch_webhook_event;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
}

/// Create checkout response
#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    /// Hosted checkout URL (redirect the browser here)
    pub url: String,
}

/// Auth callback query string
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    /// Set by the auth provider when login was aborted upstream
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: MoodError) -> ApiError {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "moodring",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a hosted subscription checkout session.
///
/// Each call opens a new session at the provider unless the client sends an
/// `Idempotency-Key` header, which is forwarded as-is.
#[instrument(skip_all)]
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!("Rejected checkout body: {}", rejection.body_text());
        error_response(MoodError::InvalidRequest(rejection.body_text()))
    })?;

    let request =
        CheckoutRequest::from_parts(body.user_id, body.price_id).map_err(error_response)?;

    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let session = start_checkout(
        state.billing.as_ref(),
        &request,
        &state.checkout_urls,
        idempotency_key,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(CreateCheckoutResponse { url: session.url }))
}

/// Auth provider redirect target.
///
/// Always answers with a redirect: the dashboard when there is no code or
/// the exchange worked, the login page with `error=auth_failed` otherwise.
#[instrument(skip_all, fields(has_code = params.code.is_some()))]
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(upstream) = &params.error {
        info!(
            "Auth provider reported error: {} ({})",
            upstream,
            params.error_description.as_deref().unwrap_or("no description")
        );
    }

    let code = AuthCode::from_query(params.code);
    let exchanging = code.is_some();
    let verifier = read_cookie(&headers, &state.code_verifier_cookie);

    let outcome = resolve_callback(state.auth.as_ref(), code, verifier.as_deref()).await;
    let location = state.redirects.location(&outcome);
    let secure = state.config.secure_cookies();

    let mut cookies = Vec::new();
    if let Some(session) = outcome.session() {
        cookies.extend(session_cookies(&state.config.session_cookie, session, secure));
    }
    if exchanging {
        // The verifier is single-use alongside the code
        cookies.push(expire_cookie(&state.code_verifier_cookie, secure));
    }

    let set_cookies: Vec<_> = cookies
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie))
        .collect();

    (AppendHeaders(set_cookies), Redirect::to(&location)).into_response()
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing Stripe-Signature header", 400)),
            )
        })?;

    let event = state
        .billing
        .verify_webhook(&body, signature)
        .await
        .map_err(|e| {
            error!("Webhook verification failed: {}", e);
            error_response(e)
        })?;

    info!(
        "Received webhook: type={:?}, id={}, user={:?}",
        event.event_type, event.event_id, event.user_id
    );

    dispatch_webhook_event(state.webhooks.as_ref(), event).map_err(|e| {
        error!("Webhook handler error: {}", e);
        error_response(e)
    })?;

    Ok(StatusCode::OK)
}

/// Active plans for the pricing page
pub async fn list_plans(State(state): State<AppState>) -> impl IntoResponse {
    let plans: Vec<_> = state.plans.active_plans().collect();
    Json(serde_json::json!({
        "plans": plans,
        "count": plans.len()
    }))
}
