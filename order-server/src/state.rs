//! Application state for the order server

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::config::Config;
use crate::db::{PgCatalog, PgOrderStore};
use crate::idempotency::{IdempotencyStore, MemoryIdempotencyStore};
use crate::live::OrderEventHub;
use crate::orders::{OrderService, OrderSettings};
use crate::stripe::{PaymentGateway, StripeGateway};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Order engine
    pub orders: OrderService,
    /// Realtime status fan-out (also the engine's notifier)
    pub hub: OrderEventHub,
    /// Bearer token for admin routes
    pub admin_token: Arc<str>,
    /// In-process webhook markers, swept periodically; `None` when Redis holds them
    pub markers: Option<MemoryIdempotencyStore>,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        // Lazy pool: the server starts even when PostgreSQL is down and
        // serves provisional checkouts until it comes back
        let connect_options = PgConnectOptions::from_str(&config.database_url)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect_lazy_with(connect_options);

        match sqlx::migrate!("./migrations").run(&pool).await {
            Ok(()) => tracing::info!("Database migrations applied"),
            Err(e) => tracing::warn!(error = %e, "Database migrations not applied, storage may be unreachable"),
        }

        let gateway: Option<Arc<dyn PaymentGateway>> = match config.stripe_credentials() {
            Some((secret_key, webhook_secret)) => Some(Arc::new(StripeGateway::new(
                secret_key,
                webhook_secret,
                config.gateway_timeout,
            )?)),
            None => {
                tracing::warn!("Stripe credentials not configured, online payments disabled");
                None
            }
        };

        let (idempotency, markers) = Self::idempotency_store(config).await?;

        let hub = OrderEventHub::new();
        let orders = OrderService::new(
            Arc::new(PgCatalog::new(pool.clone())),
            Arc::new(PgOrderStore::new(pool)),
            gateway,
            idempotency,
            Arc::new(hub.clone()),
            OrderSettings {
                delivery_charge: config.delivery_charge,
                currency: config.currency.clone(),
                idempotency_ttl: config.idempotency_ttl,
            },
        );

        Ok(Self {
            orders,
            hub,
            admin_token: Arc::from(config.admin_token.as_str()),
            markers,
        })
    }

    /// State around an already-wired order engine
    pub fn from_service(orders: OrderService, hub: OrderEventHub, admin_token: &str) -> Self {
        Self {
            orders,
            hub,
            admin_token: Arc::from(admin_token),
            markers: None,
        }
    }

    async fn idempotency_store(
        config: &Config,
    ) -> Result<(Arc<dyn IdempotencyStore>, Option<MemoryIdempotencyStore>), BoxError> {
        #[cfg(feature = "redis")]
        if let Some(url) = &config.redis_url {
            let store = crate::idempotency::redis_store::RedisIdempotencyStore::connect(url).await?;
            tracing::info!("Webhook idempotency markers stored in Redis");
            return Ok((Arc::new(store), None));
        }

        #[cfg(not(feature = "redis"))]
        if config.redis_url.is_some() {
            tracing::warn!("REDIS_URL is set but the redis feature is disabled, using in-process markers");
        }

        let store = MemoryIdempotencyStore::new();
        Ok((Arc::new(store.clone()), Some(store)))
    }

    /// Periodic housekeeping: expired webhook markers, idle realtime topics
    pub fn sweep(&self) {
        if let Some(markers) = &self.markers {
            markers.cleanup();
        }
        self.hub.prune();
    }
}
