//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the injected providers, configuration and plan catalog.

use mood_auth::SupabaseAuth;
use mood_core::{BoxedAuthProvider, BoxedBillingProvider, CheckoutUrls, PlanCatalog, RedirectPaths};
use mood_stripe::{LoggingWebhookHandler, StripeBilling, WebhookHandler};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public origin of the site, used for checkout return URLs
    pub public_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Upper bound on handling a single request
    pub request_timeout: Duration,
    /// Cookie holding the access token after login
    pub session_cookie: String,
    /// Cookie the browser stored the PKCE verifier in
    pub code_verifier_cookie: Option<String>,
    /// Explicit plan catalog path
    pub plans_path: Option<String>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT is not a valid port: {}", raw))?,
            None => defaults.port,
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .map_err(|_| anyhow::anyhow!("REQUEST_TIMEOUT_SECS is not a number: {}", raw))?,
            ),
            None => defaults.request_timeout,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got {}", other),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            public_url: lookup("PUBLIC_SITE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            request_timeout,
            session_cookie: lookup("SESSION_COOKIE_NAME").unwrap_or(defaults.session_cookie),
            code_verifier_cookie: lookup("CODE_VERIFIER_COOKIE"),
            plans_path: lookup("PLANS_PATH"),
            log_format,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Cookies get the `Secure` attribute when the site is served over https
    pub fn secure_cookies(&self) -> bool {
        self.public_url.starts_with("https://")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            request_timeout: Duration::from_secs(30),
            session_cookie: "mood-session".to_string(),
            code_verifier_cookie: None,
            plans_path: None,
            log_format: LogFormat::Pretty,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payments provider
    pub billing: BoxedBillingProvider,
    /// Auth provider
    pub auth: BoxedAuthProvider,
    /// Fulfillment hooks for verified webhooks
    pub webhooks: Arc<dyn WebhookHandler>,
    /// Plan catalog
    pub plans: Arc<PlanCatalog>,
    /// Checkout return URLs
    pub checkout_urls: CheckoutUrls,
    /// Callback redirect targets
    pub redirects: RedirectPaths,
    /// Cookie name of the PKCE verifier
    pub code_verifier_cookie: String,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create state from the environment with Stripe and Supabase providers
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let billing = StripeBilling::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
        let auth = SupabaseAuth::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Supabase: {}", e))?;
        let verifier_cookie = auth.config().code_verifier_cookie();

        let plans = load_plan_catalog(config.plans_path.as_deref())?;

        let mut state = Self::with_providers(config, Arc::new(billing), Arc::new(auth), plans);
        if state.config.code_verifier_cookie.is_none() {
            state.code_verifier_cookie = verifier_cookie;
        }
        Ok(state)
    }

    /// Assemble state around already-built providers
    pub fn with_providers(
        config: AppConfig,
        billing: BoxedBillingProvider,
        auth: BoxedAuthProvider,
        plans: PlanCatalog,
    ) -> Self {
        let code_verifier_cookie = config
            .code_verifier_cookie
            .clone()
            .unwrap_or_else(|| "sb-auth-token-code-verifier".to_string());

        Self {
            billing,
            auth,
            webhooks: Arc::new(LoggingWebhookHandler),
            plans: Arc::new(plans),
            checkout_urls: CheckoutUrls::new(&config.public_url),
            // Relative locations keep redirects on whatever origin the browser used
            redirects: RedirectPaths::default(),
            code_verifier_cookie,
            config,
        }
    }

    /// Builder: replace the webhook handler
    pub fn with_webhook_handler(mut self, handler: Arc<dyn WebhookHandler>) -> Self {
        self.webhooks = handler;
        self
    }
}

/// Load the plan catalog from config
fn load_plan_catalog(explicit: Option<&str>) -> anyhow::Result<PlanCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;
        return parse_catalog(path, &content);
    }

    let config_paths = [
        "config/plans.toml",
        "../config/plans.toml",
        "../../config/plans.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_catalog(path, &content);
        }
    }

    // Return empty catalog if no config found
    tracing::warn!("No plan catalog found, using empty catalog");
    Ok(PlanCatalog::new())
}

fn parse_catalog(path: &str, content: &str) -> anyhow::Result<PlanCatalog> {
    let catalog = PlanCatalog::from_toml(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
    tracing::info!("Loaded {} plans from {}", catalog.plans.len(), path);
    Ok(catalog)
}
