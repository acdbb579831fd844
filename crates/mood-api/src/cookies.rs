//! Cookie helpers for the auth callback.

use axum::http::{header, HeaderMap};
use mood_core::AuthSession;

/// Read a cookie from the request `Cookie` header(s)
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn attributes(secure: bool) -> &'static str {
    if secure {
        "Path=/; HttpOnly; Secure; SameSite=Lax"
    } else {
        "Path=/; HttpOnly; SameSite=Lax"
    }
}

/// `Set-Cookie` values that persist a freshly exchanged session
pub fn session_cookies(name: &str, session: &AuthSession, secure: bool) -> Vec<String> {
    let max_age = session
        .expires_in_secs()
        .map(|secs| format!("; Max-Age={}", secs))
        .unwrap_or_default();

    vec![
        format!(
            "{}={}; {}{}",
            name,
            session.access_token,
            attributes(secure),
            max_age
        ),
        format!(
            "{}-refresh={}; {}",
            name,
            session.refresh_token,
            attributes(secure)
        ),
    ]
}

/// `Set-Cookie` value that removes a cookie
pub fn expire_cookie(name: &str, secure: bool) -> String {
    format!("{}=; {}; Max-Age=0", name, attributes(secure))
}
