//! order-server: restaurant ordering backend
//!
//! Long-running service that:
//! - Prices and persists storefront checkouts (PostgreSQL)
//! - Creates and reconciles Stripe payment intents
//! - Lets staff move orders through their lifecycle
//! - Fans out status changes to realtime subscribers

use order_server::{AppState, Config, api};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "order_server=info,tower_http=info".into());
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env()?;

    tracing::info!(
        environment = %config.environment,
        currency = %config.currency,
        delivery_charge = %config.delivery_charge,
        "Starting order-server"
    );

    // Initialize application state
    let state = AppState::new(&config).await?;

    // Periodic marker / topic cleanup (every 5 minutes)
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            sweeper.sweep();
        }
    });

    let app = api::create_router(state, config.request_timeout);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("order-server HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
