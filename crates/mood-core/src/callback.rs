//! # Auth Callback
//!
//! The login redirect lands here. Every input ends in one of two redirects:
//!
//! ```text
//!   code absent ─────────────────────────────► Dashboard
//!   code present ─► exchange ─┬─ ok ─────────► Dashboard (session)
//!                             └─ err ─ log ──► Login?error=auth_failed
//! ```

use crate::auth::{AuthCode, AuthProvider, AuthSession};
use tracing::{info, instrument, warn};

/// Error flag value for a failed code exchange
pub const AUTH_FAILED: &str = "auth_failed";

/// Terminal outcome of the auth callback
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// Go to the dashboard. `session` is set when a code was exchanged.
    Dashboard { session: Option<AuthSession> },
    /// Go back to login with a generic error flag
    Login { error: &'static str },
}

impl CallbackOutcome {
    pub fn is_dashboard(&self) -> bool {
        matches!(self, CallbackOutcome::Dashboard { .. })
    }

    /// The session established by this callback, if any
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            CallbackOutcome::Dashboard { session } => session.as_ref(),
            CallbackOutcome::Login { .. } => None,
        }
    }
}

/// Resolve an auth callback.
///
/// Without a code this is a pass-through to the dashboard; no existing
/// session is checked. With a code, one exchange is attempted. Failures are
/// logged here and never returned.
#[instrument(skip_all, fields(provider = provider.provider_name(), has_code = code.is_some()))]
pub async fn resolve_callback(
    provider: &dyn AuthProvider,
    code: Option<AuthCode>,
    code_verifier: Option<&str>,
) -> CallbackOutcome {
    let Some(code) = code else {
        info!("Callback without code, passing through to dashboard");
        return CallbackOutcome::Dashboard { session: None };
    };

    match provider.exchange_code(code, code_verifier).await {
        Ok(session) => {
            info!("Session established for user {}", session.user.id);
            CallbackOutcome::Dashboard {
                session: Some(session),
            }
        }
        Err(e) => {
            warn!("Auth code exchange failed: {}", e);
            CallbackOutcome::Login { error: AUTH_FAILED }
        }
    }
}

/// Where callback outcomes redirect to
#[derive(Debug, Clone)]
pub struct RedirectPaths {
    /// Public site origin prepended to every path (may be empty)
    pub base_url: String,
    pub dashboard: String,
    pub login: String,
    /// Query parameter carrying the error flag
    pub error_param: String,
}

impl RedirectPaths {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            dashboard: "/dashboard".to_string(),
            login: "/login".to_string(),
            error_param: "error".to_string(),
        }
    }

    /// Render an outcome as a `Location` value
    pub fn location(&self, outcome: &CallbackOutcome) -> String {
        match outcome {
            CallbackOutcome::Dashboard { .. } => format!("{}{}", self.base_url, self.dashboard),
            CallbackOutcome::Login { error } => format!(
                "{}{}?{}={}",
                self.base_url, self.login, self.error_param, error
            ),
        }
    }
}

impl Default for RedirectPaths {
    fn default() -> Self {
        Self::new("")
    }
}
