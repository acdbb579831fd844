//! # Error Types
//!
//! Typed error handling for the moodring server.
//! Every provider call and flow returns `Result<T, MoodError>`.

use thiserror::Error;

/// Core error type for checkout, auth and webhook operations
#[derive(Debug, Error)]
pub enum MoodError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data, or a request the provider refused (e.g. unknown price)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with a provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Provider did not answer within the client timeout
    #[error("Timed out waiting for {provider}")]
    Timeout { provider: String },

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Authorization code could not be exchanged for a session
    #[error("Auth code exchange failed: {0}")]
    AuthExchangeFailed(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MoodError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            MoodError::Configuration(_) => 500,
            MoodError::InvalidRequest(_) => 400,
            MoodError::ProviderError { .. } => 502,
            MoodError::NetworkError(_) => 503,
            MoodError::Timeout { .. } => 504,
            MoodError::RateLimited { .. } => 429,
            MoodError::AuthExchangeFailed(_) => 401,
            MoodError::WebhookVerificationFailed(_) => 401,
            MoodError::WebhookParseError(_) => 400,
            MoodError::Serialization(_) => 500,
            MoodError::Internal(_) => 500,
        }
    }

    /// Map a transport-level HTTP client failure for `provider`.
    pub fn from_transport(provider: &str, timed_out: bool, message: impl Into<String>) -> Self {
        if timed_out {
            MoodError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            MoodError::NetworkError(message.into())
        }
    }
}

/// Result type alias for moodring operations
pub type MoodResult<T> = Result<T, MoodError>;
