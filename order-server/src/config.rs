//! Order server configuration

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Order server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Flat charge added to delivery orders
    pub delivery_charge: Decimal,
    /// ISO currency code passed to the payment gateway (lowercase)
    pub currency: String,
    /// Stripe secret key; online payments are disabled when absent
    pub stripe_secret_key: Option<String>,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: Option<String>,
    pub idempotency_ttl: Duration,
    pub gateway_timeout: Duration,
    pub request_timeout: Duration,
    /// Bearer token for admin routes
    pub admin_token: String,
    /// Redis URL for shared idempotency markers (`redis` feature)
    pub redis_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Optional secret: absent is fine, but a set-but-empty value outside
    /// development is a misconfiguration.
    fn optional_secret(name: &str, environment: &str) -> Result<Option<String>, BoxError> {
        match std::env::var(name) {
            Ok(v) if v.trim().is_empty() => {
                if environment != "development" {
                    return Err(
                        format!("{name} must not be empty in {environment} environment").into(),
                    );
                }
                Ok(None)
            }
            Ok(v) => Ok(Some(v)),
            Err(_) => Ok(None),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let delivery_charge = match env_opt("DELIVERY_CHARGE") {
            Some(raw) => Decimal::from_str(raw.trim())
                .map_err(|e| format!("DELIVERY_CHARGE is not a decimal ({raw}): {e}"))?,
            None => Decimal::ZERO,
        };
        if delivery_charge.is_sign_negative() && !delivery_charge.is_zero() {
            return Err("DELIVERY_CHARGE must not be negative".into());
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: env_parse("HTTP_PORT", 8080),
            delivery_charge,
            currency: env_opt("CURRENCY")
                .map(|c| c.trim().to_lowercase())
                .unwrap_or_else(|| "eur".into()),
            stripe_secret_key: Self::optional_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::optional_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            idempotency_ttl: Duration::from_secs(env_parse("IDEMPOTENCY_TTL_SECS", 86_400)),
            gateway_timeout: Duration::from_secs(env_parse("GATEWAY_TIMEOUT_SECS", 15)),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", 30)),
            admin_token: Self::require_secret("ADMIN_API_TOKEN", &environment)?,
            redis_url: env_opt("REDIS_URL"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout: Duration::from_secs(env_parse("DB_ACQUIRE_TIMEOUT_SECS", 5)),
            environment,
        })
    }

    /// Stripe credentials, when both halves are configured
    pub fn stripe_credentials(&self) -> Option<(&str, &str)> {
        match (&self.stripe_secret_key, &self.stripe_webhook_secret) {
            (Some(key), Some(secret)) => Some((key, secret)),
            _ => None,
        }
    }
}
