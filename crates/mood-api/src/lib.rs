//! # mood-api
//!
//! HTTP API layer for the moodring server.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Subscription checkout and auth callback endpoints
//! - Stripe webhook receiver
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/checkout` | Create subscription checkout, returns `{url}` |
//! | GET | `/api/plans` | Plans for the pricing page |
//! | GET | `/auth/callback` | Exchange `code` for a session, redirect |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod cookies;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState, LogFormat};
