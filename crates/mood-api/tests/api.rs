//! End-to-end tests of the HTTP surface with in-memory providers.

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use mood_api::{create_router, AppConfig, AppState};
use mood_core::{
    AuthCode, AuthProvider, AuthSession, AuthUser, BillingInterval, BillingProvider,
    CheckoutRequest, CheckoutSession, CheckoutUrls, Currency, MoodError, MoodResult, Plan,
    PlanCatalog, Price, WebhookEvent, WebhookEventType,
};
use mood_stripe::{SubscriptionEventData, WebhookHandler};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const VERIFIER_COOKIE: &str = "sb-test-auth-token-code-verifier";

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeBilling {
    fail: bool,
    calls: Mutex<Vec<(CheckoutRequest, Option<String>)>>,
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_subscription_checkout(
        &self,
        request: &CheckoutRequest,
        _urls: &CheckoutUrls,
        idempotency_key: Option<&str>,
    ) -> MoodResult<CheckoutSession> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), idempotency_key.map(String::from)));

        if self.fail {
            return Err(MoodError::InvalidRequest(format!(
                "No such price: '{}'",
                request.price_id
            )));
        }
        Ok(CheckoutSession::new(
            "xyz",
            "fake",
            "https://checkout.example/session/xyz",
        ))
    }

    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> MoodResult<WebhookEvent> {
        if signature != "valid" {
            return Err(MoodError::WebhookVerificationFailed("Signature mismatch".into()));
        }
        let raw: Value = serde_json::from_slice(payload)
            .map_err(|e| MoodError::WebhookParseError(e.to_string()))?;
        Ok(WebhookEvent {
            event_id: "evt_1".into(),
            event_type: WebhookEventType::CheckoutCompleted,
            provider: "fake".into(),
            user_id: raw.get("userId").and_then(|v| v.as_str()).map(String::from),
            customer_id: None,
            subscription_id: Some("sub_1".into()),
            raw_data: Some(raw),
            timestamp: Utc::now(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Accepts the code "good" once, and only with verifier "v123".
struct FakeAuth {
    unused: Mutex<bool>,
}

impl FakeAuth {
    fn new() -> Self {
        Self {
            unused: Mutex::new(true),
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn exchange_code(
        &self,
        code: AuthCode,
        code_verifier: Option<&str>,
    ) -> MoodResult<AuthSession> {
        let mut unused = self.unused.lock().unwrap();
        if code.as_str() == "good" && code_verifier == Some("v123") && *unused {
            *unused = false;
            return Ok(AuthSession {
                access_token: "access-abc".into(),
                refresh_token: "refresh-def".into(),
                token_type: "bearer".into(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                user: AuthUser {
                    id: "u1".into(),
                    email: Some("u1@example.com".into()),
                },
            });
        }
        Err(MoodError::AuthExchangeFailed("invalid flow state".into()))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Answers after `delay` with the client-side timeout error.
struct SlowAuth {
    delay: std::time::Duration,
}

#[async_trait]
impl AuthProvider for SlowAuth {
    async fn exchange_code(
        &self,
        _code: AuthCode,
        _code_verifier: Option<&str>,
    ) -> MoodResult<AuthSession> {
        tokio::time::sleep(self.delay).await;
        Err(MoodError::Timeout {
            provider: "fake".into(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Default)]
struct RecordingHandler {
    users: Mutex<Vec<Option<String>>>,
}

impl WebhookHandler for RecordingHandler {
    fn on_checkout_completed(&self, data: SubscriptionEventData) -> MoodResult<()> {
        self.users.lock().unwrap().push(data.user_id);
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    server: TestServer,
    billing: Arc<FakeBilling>,
    webhooks: Arc<RecordingHandler>,
}

fn plans() -> PlanCatalog {
    let mut catalog = PlanCatalog::new();
    catalog.add(Plan::new(
        "plus-monthly",
        "Plus",
        "price_abc",
        Price::from_cents(499, Currency::USD),
        BillingInterval::Monthly,
    ));
    let mut retired = Plan::new(
        "legacy",
        "Legacy",
        "price_old",
        Price::from_cents(299, Currency::USD),
        BillingInterval::Monthly,
    );
    retired.active = false;
    catalog.add(retired);
    catalog
}

fn test_config() -> AppConfig {
    AppConfig {
        public_url: "https://moodring.app".into(),
        code_verifier_cookie: Some(VERIFIER_COOKIE.into()),
        ..AppConfig::default()
    }
}

fn harness(billing: FakeBilling) -> Harness {
    harness_with(test_config(), billing, Arc::new(FakeAuth::new()))
}

fn harness_with(config: AppConfig, billing: FakeBilling, auth: Arc<dyn AuthProvider>) -> Harness {
    let billing = Arc::new(billing);
    let webhooks = Arc::new(RecordingHandler::default());

    let state = AppState::with_providers(config, billing.clone(), auth, plans())
        .with_webhook_handler(webhooks.clone());

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        billing,
        webhooks,
    }
}

fn location(response: &axum_test::TestResponse) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn set_cookies(response: &axum_test::TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect()
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn checkout_returns_provider_url() {
    let h = harness(FakeBilling::default());

    let response = h
        .server
        .post("/api/checkout")
        .json(&json!({ "userId": "u1", "priceId": "price_abc" }))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({ "url": "https://checkout.example/session/xyz" }));

    let calls = h.billing.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, CheckoutRequest::new("u1", "price_abc"));
    assert_eq!(calls[0].1, None);
}

#[tokio::test]
async fn checkout_missing_field_is_bad_request() {
    let h = harness(FakeBilling::default());

    let response = h
        .server
        .post("/api/checkout")
        .json(&json!({ "userId": "u1" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("priceId"));
    assert!(body.get("url").is_none());
    assert!(h.billing.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_malformed_body_is_bad_request() {
    let h = harness(FakeBilling::default());

    let response = h
        .server
        .post("/api/checkout")
        .content_type("application/json")
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(h.billing.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_provider_failure_is_not_success() {
    let h = harness(FakeBilling {
        fail: true,
        ..FakeBilling::default()
    });

    let response = h
        .server
        .post("/api/checkout")
        .json(&json!({ "userId": "u1", "priceId": "price_missing" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body.get("url").is_none());
    assert_eq!(body["code"], 400);
    assert_eq!(h.billing.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_forwards_idempotency_key() {
    let h = harness(FakeBilling::default());

    h.server
        .post("/api/checkout")
        .add_header(
            HeaderName::from_static("idempotency-key"),
            HeaderValue::from_static("submit-1"),
        )
        .json(&json!({ "userId": "u1", "priceId": "price_abc" }))
        .await
        .assert_status_ok();

    let calls = h.billing.calls.lock().unwrap();
    assert_eq!(calls[0].1.as_deref(), Some("submit-1"));
}

// =============================================================================
// Auth callback
// =============================================================================

#[tokio::test]
async fn callback_without_code_goes_to_dashboard() {
    let h = harness(FakeBilling::default());

    let response = h.server.get("/auth/callback").await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn callback_with_valid_code_sets_session() {
    let h = harness(FakeBilling::default());

    let response = h
        .server
        .get("/auth/callback")
        .add_query_param("code", "good")
        .add_header(
            HeaderName::from_static("cookie"),
            HeaderValue::from_static("sb-test-auth-token-code-verifier=v123"),
        )
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("mood-session=access-abc;")));
    assert!(cookies.iter().any(|c| c.starts_with("mood-session-refresh=refresh-def;")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(VERIFIER_COOKIE) && c.contains("Max-Age=0")));
    assert!(cookies.iter().all(|c| c.contains("Secure")));
}

#[tokio::test]
async fn callback_code_cannot_be_reused() {
    let h = harness(FakeBilling::default());
    let cookie = HeaderValue::from_static("sb-test-auth-token-code-verifier=v123");

    let first = h
        .server
        .get("/auth/callback")
        .add_query_param("code", "good")
        .add_header(HeaderName::from_static("cookie"), cookie.clone())
        .await;
    assert_eq!(location(&first), "/dashboard");

    let replay = h
        .server
        .get("/auth/callback")
        .add_query_param("code", "good")
        .add_header(HeaderName::from_static("cookie"), cookie)
        .await;
    assert_eq!(location(&replay), "/login?error=auth_failed");
}

#[tokio::test]
async fn callback_with_bad_code_goes_to_login() {
    let h = harness(FakeBilling::default());

    let response = h
        .server
        .get("/auth/callback")
        .add_query_param("code", "bad")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=auth_failed");
    assert!(set_cookies(&response)
        .iter()
        .all(|c| !c.starts_with("mood-session")));
}

#[tokio::test]
async fn callback_outlasting_request_timeout_still_redirects_to_login() {
    let config = AppConfig {
        request_timeout: std::time::Duration::from_millis(50),
        ..test_config()
    };
    let auth = Arc::new(SlowAuth {
        delay: std::time::Duration::from_millis(300),
    });
    let h = harness_with(config, FakeBilling::default(), auth);

    let response = h
        .server
        .get("/auth/callback")
        .add_query_param("code", "abc")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=auth_failed");
}

// =============================================================================
// Webhooks, plans, health
// =============================================================================

#[tokio::test]
async fn webhook_dispatches_verified_event() {
    let h = harness(FakeBilling::default());

    h.server
        .post("/webhook/stripe")
        .add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_static("valid"),
        )
        .text(r#"{"userId":"u1"}"#)
        .await
        .assert_status_ok();

    assert_eq!(
        *h.webhooks.users.lock().unwrap(),
        vec![Some("u1".to_string())]
    );
}

#[tokio::test]
async fn webhook_rejects_missing_or_bad_signature() {
    let h = harness(FakeBilling::default());

    h.server
        .post("/webhook/stripe")
        .text("{}")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    h.server
        .post("/webhook/stripe")
        .add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_static("forged"),
        )
        .text("{}")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert!(h.webhooks.users.lock().unwrap().is_empty());
}

#[tokio::test]
async fn plans_lists_active_only() {
    let h = harness(FakeBilling::default());

    let response = h.server.get("/api/plans").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["plans"][0]["priceId"], "price_abc");
}

#[tokio::test]
async fn health_reports_service() {
    let h = harness(FakeBilling::default());

    let response = h.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(response.headers().contains_key("x-request-id"));
}
