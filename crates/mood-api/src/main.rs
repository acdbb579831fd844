//! # moodring server
//!
//! Subscription checkout and login callback for the moodring app.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export SUPABASE_URL=https://<project>.supabase.co
//! export SUPABASE_ANON_KEY=...
//! export PUBLIC_SITE_URL=https://moodring.app
//!
//! # Run the server
//! mood-server
//! ```

use mood_api::{routes, AppConfig, AppState, LogFormat};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging comes up before the rest of config so config errors are logged
    dotenvy::dotenv().ok();
    init_tracing(AppConfig::from_env().map(|c| c.log_format).unwrap_or_default());

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Plans loaded: {}", state.plans.plans.len());
    info!(
        "Providers: billing={}, auth={}",
        state.billing.provider_name(),
        state.auth.provider_name()
    );

    let webhook_path = state.billing.webhook_path();
    let app = routes::create_router(state);

    info!("moodring server v{} starting on http://{}", env!("CARGO_PKG_VERSION"), addr);

    if !is_prod {
        info!("Checkout: POST http://{}/api/checkout", addr);
        info!("Callback: GET http://{}/auth/callback", addr);
        info!("Webhook: POST http://{}{}", addr, webhook_path);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
