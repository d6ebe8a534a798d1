/// Wishlist API
///
/// Backend for a shared gift wishlist: user accounts with stateless session
/// tokens, a password reset flow by email, and item reservations that only
/// one person can hold at a time.

mod api;
mod auth;
mod clock;
mod config;
mod context;
mod db;
mod error;
mod item;
mod mailer;
mod metrics;
mod rate_limit;
mod server;
mod store;
mod user;
mod validation;

use config::{LoggingConfig, ServerConfig};
use context::AppContext;
use error::WishlistResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> WishlistResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    init_tracing(&config.logging);

    tracing::info!("Starting Wishlist API v{}", env!("CARGO_PKG_VERSION"));

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
