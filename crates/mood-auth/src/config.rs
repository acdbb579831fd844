//! # Supabase Configuration
//!
//! Loaded from environment variables, like the Stripe config.

use mood_core::MoodError;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Supabase project configuration
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL (e.g., "https://abcd1234.supabase.co")
    pub url: String,

    /// Public anon key, sent as the `apikey` header
    pub anon_key: String,

    /// Per-request timeout for auth calls
    pub timeout: Duration,
}

impl SupabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional: `SUPABASE_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, MoodError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MoodError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("SUPABASE_URL")
            .ok_or_else(|| MoodError::Configuration("SUPABASE_URL not set".to_string()))?;

        let anon_key = lookup("SUPABASE_ANON_KEY")
            .ok_or_else(|| MoodError::Configuration("SUPABASE_ANON_KEY not set".to_string()))?;

        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(MoodError::Configuration(
                "SUPABASE_URL must be an http(s) URL".to_string(),
            ));
        }

        let timeout = match lookup("SUPABASE_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                MoodError::Configuration(format!("SUPABASE_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self::new(url, anon_key).with_timeout(timeout))
    }

    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Builder: set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Project ref, the first host label of a hosted project URL
    pub fn project_ref(&self) -> Option<&str> {
        let host = self.url.split("://").nth(1)?.split(['/', ':']).next()?;
        host.strip_suffix(".supabase.co")
    }

    /// Name of the cookie supabase-js stores the PKCE verifier in
    pub fn code_verifier_cookie(&self) -> String {
        match self.project_ref() {
            Some(project) => format!("sb-{}-auth-token-code-verifier", project),
            None => "sb-auth-token-code-verifier".to_string(),
        }
    }

    pub(crate) fn token_url(&self) -> String {
        format!("{}/auth/v1/token", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup() {
        let config = SupabaseConfig::from_lookup(|key| match key {
            "SUPABASE_URL" => Some("https://abcd1234.supabase.co/".to_string()),
            "SUPABASE_ANON_KEY" => Some("anon".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.url, "https://abcd1234.supabase.co");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.token_url(), "https://abcd1234.supabase.co/auth/v1/token");
    }

    #[test]
    fn test_rejects_missing_and_bad_url() {
        assert!(SupabaseConfig::from_lookup(|_| None).is_err());

        let bad = SupabaseConfig::from_lookup(|key| match key {
            "SUPABASE_URL" => Some("abcd1234.supabase.co".to_string()),
            "SUPABASE_ANON_KEY" => Some("anon".to_string()),
            _ => None,
        });
        assert!(matches!(bad, Err(MoodError::Configuration(_))));
    }

    #[test]
    fn test_code_verifier_cookie() {
        let hosted = SupabaseConfig::new("https://abcd1234.supabase.co", "anon");
        assert_eq!(hosted.project_ref(), Some("abcd1234"));
        assert_eq!(
            hosted.code_verifier_cookie(),
            "sb-abcd1234-auth-token-code-verifier"
        );

        let local = SupabaseConfig::new("http://127.0.0.1:54321", "anon");
        assert_eq!(local.project_ref(), None);
        assert_eq!(local.code_verifier_cookie(), "sb-auth-token-code-verifier");
    }
}
