//! # Routes
//!
//! Axum router configuration for the moodring API.

use crate::handlers;
use crate::middleware::MakeRequestUuid;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  /health, / - Health check
/// - POST /api/checkout - Create subscription checkout
/// - GET  /api/plans - Plans for the pricing page
/// - GET  /auth/callback - Auth code exchange + redirect
/// - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    // Browser calls come from the public site only
    let origin = match HeaderValue::from_str(&state.config.public_url) {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => {
            tracing::warn!("PUBLIC_SITE_URL is not a valid origin, allowing any");
            AllowOrigin::from(Any)
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/checkout", post(handlers::create_checkout))
        .route("/plans", get(handlers::list_plans))
        .layer(cors);

    let auth_routes = Router::new().route("/callback", get(handlers::auth_callback));

    // Webhook routes (no CORS, must accept raw body)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        .nest("/webhook", webhook_routes)
        // The callback is bounded by the auth client timeout and must always redirect
        .layer(TimeoutLayer::new(request_timeout))
        .nest("/auth", auth_routes)
        // Middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
        // State
        .with_state(state)
}
