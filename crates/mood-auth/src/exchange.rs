//! # Code Exchange
//!
//! PKCE authorization-code-for-session exchange against Supabase GoTrue.

use crate::config::SupabaseConfig;
use crate::PROVIDER;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mood_core::{AuthCode, AuthProvider, AuthSession, AuthUser, MoodError, MoodResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Supabase auth provider
pub struct SupabaseAuth {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> MoodResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MoodError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> MoodResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: AuthCode,
        code_verifier: Option<&str>,
    ) -> MoodResult<AuthSession> {
        let body = TokenRequest {
            auth_code: code.into_inner(),
            code_verifier: code_verifier.unwrap_or_default(),
        };

        if code_verifier.is_none() {
            debug!("No PKCE verifier supplied with auth code");
        }

        let response = self
            .client
            .post(self.config.token_url())
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MoodError::from_transport(PROVIDER, e.is_timeout(), e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MoodError::from_transport(PROVIDER, e.is_timeout(), e.to_string()))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<GoTrueError>(&text)
                .ok()
                .and_then(GoTrueError::reason)
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!("Supabase token exchange rejected: status={}, reason={}", status, reason);

            if status.is_server_error() {
                return Err(MoodError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: reason,
                });
            }
            return Err(MoodError::AuthExchangeFailed(reason));
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            MoodError::Serialization(format!("Failed to parse Supabase session: {}", e))
        })?;

        Ok(token.into_session(Utc::now()))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// GoTrue API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    auth_code: String,
    code_verifier: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(Duration::try_seconds)
                    .and_then(|ttl| now.checked_add_signed(ttl))
            });

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: AuthUser {
                id: self.user.id,
                email: self.user.email,
            },
        }
    }
}

/// GoTrue has used several error shapes across versions
#[derive(Debug, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GoTrueError {
    fn reason(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn auth_for(server: &MockServer) -> SupabaseAuth {
        SupabaseAuth::new(SupabaseConfig::new(server.uri(), "anon-key")).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "pkce"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({ "auth_code": "good", "code_verifier": "v123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "refresh_token": "rt",
                "token_type": "bearer",
                "expires_in": 3600,
                "user": { "id": "u1", "email": "u1@example.com" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = auth_for(&server)
            .exchange_code(AuthCode::new("good"), Some("v123"))
            .await
            .unwrap();

        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.email.as_deref(), Some("u1@example.com"));
        assert!(session.expires_in_secs().unwrap() > 3500);
    }

    #[tokio::test]
    async fn test_exchange_rejected_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "invalid flow state, no valid flow state found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = auth_for(&server)
            .exchange_code(AuthCode::new("bad"), Some("v123"))
            .await
            .unwrap_err();

        assert!(matches!(err, MoodError::AuthExchangeFailed(msg) if msg.contains("flow state")));
    }

    #[tokio::test]
    async fn test_exchange_provider_outage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = auth_for(&server)
            .exchange_code(AuthCode::new("good"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, MoodError::ProviderError { .. }));
    }

    #[test]
    fn test_into_session_prefers_absolute_expiry() {
        let now = Utc::now();
        let token = TokenResponse {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_type: None,
            expires_in: Some(10),
            expires_at: Some(1_900_000_000),
            user: TokenUser {
                id: "u1".into(),
                email: None,
            },
        };

        let session = token.into_session(now);
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_900_000_000);
        assert_eq!(session.token_type, "bearer");
    }

    #[test]
    fn test_into_session_ignores_unrepresentable_expiry() {
        let token = TokenResponse {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_type: Some("bearer".into()),
            expires_in: Some(i64::MAX),
            expires_at: None,
            user: TokenUser {
                id: "u1".into(),
                email: None,
            },
        };

        let session = token.into_session(Utc::now());
        assert!(session.expires_at.is_none());
        assert_eq!(session.user.id, "u1");
    }

    #[test]
    fn test_gotrue_error_reason() {
        let e: GoTrueError = serde_json::from_str(r#"{"code":400,"msg":"bad code"}"#).unwrap();
        assert_eq!(e.reason().as_deref(), Some("bad code"));
    }
}
