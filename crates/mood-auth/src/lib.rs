//! # mood-auth
//!
//! Supabase auth for the moodring server.
//!
//! The browser starts a PKCE login against Supabase and comes back to
//! `/auth/callback?code=...`. `SupabaseAuth` implements
//! `mood_core::AuthProvider` by trading that code plus the stored verifier
//! for a session at `POST /auth/v1/token?grant_type=pkce`.
//!
//! ```rust,ignore
//! use mood_auth::SupabaseAuth;
//! use mood_core::{resolve_callback, AuthCode};
//!
//! let auth = SupabaseAuth::from_env()?;
//! let outcome = resolve_callback(&auth, AuthCode::from_query(code), verifier.as_deref()).await;
//! ```

pub mod config;
pub mod exchange;

pub use config::SupabaseConfig;
pub use exchange::SupabaseAuth;

/// Provider name used in errors and logs
pub const PROVIDER: &str = "supabase";
