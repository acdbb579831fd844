//! # Auth Types
//!
//! Authorization code, session, and the auth provider trait.

use crate::error::MoodResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Single-use authorization code issued by the auth provider.
///
/// Exchanging a code takes it by value, so the same `AuthCode` cannot be
/// handed to the provider twice. The provider enforces single use as well.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCode(String);

impl AuthCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Build from an optional query value; empty strings count as absent.
    pub fn from_query(code: Option<String>) -> Option<Self> {
        code.filter(|c| !c.trim().is_empty()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the code, yielding the raw value for the exchange request.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for AuthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthCode(<redacted>)")
    }
}

/// The signed-in user, as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A session established by exchanging an authorization code
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// When the access token expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthSession {
    /// Seconds until the access token expires, if known and still in the future
    pub fn expires_in_secs(&self) -> Option<i64> {
        self.expires_at
            .map(|exp| (exp - Utc::now()).num_seconds())
            .filter(|secs| *secs > 0)
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Auth provider capability: trades an authorization code for a session.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange `code` for a session.
    ///
    /// # Arguments
    /// * `code` - the single-use code from the redirect; consumed
    /// * `code_verifier` - PKCE verifier stored by the browser when login started
    async fn exchange_code(
        &self,
        code: AuthCode,
        code_verifier: Option<&str>,
    ) -> MoodResult<AuthSession>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Shared auth provider handle
pub type BoxedAuthProvider = Arc<dyn AuthProvider>;
