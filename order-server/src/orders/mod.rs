//! Order engine
//!
//! [`OrderService`] owns every collaborator an order operation needs and
//! exposes the operations themselves, split by concern:
//!
//! - `checkout`: pricing, the checkout transaction, degraded-mode fallback
//! - `status`: admin transitions and cancellation
//! - `payment`: client confirmation and gateway webhooks
//! - `query`: tracking and admin detail reads

pub mod checkout;
pub mod payment;
pub mod pricing;
pub mod query;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::db::{CatalogReader, OrderStore};
use crate::error::{OrderError, OrderResult};
use crate::idempotency::IdempotencyStore;
use crate::live::Notifier;
use crate::stripe::PaymentGateway;

pub use checkout::CheckoutOutcome;
pub use payment::WebhookOutcome;

/// Pricing and reconciliation settings
#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub delivery_charge: Decimal,
    pub currency: String,
    pub idempotency_ttl: Duration,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            delivery_charge: Decimal::ZERO,
            currency: "eur".into(),
            idempotency_ttl: Duration::from_secs(86_400),
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    catalog: Arc<dyn CatalogReader>,
    store: Arc<dyn OrderStore>,
    /// `None` when online payments are not configured
    gateway: Option<Arc<dyn PaymentGateway>>,
    idempotency: Arc<dyn IdempotencyStore>,
    notifier: Arc<dyn Notifier>,
    settings: OrderSettings,
}

impl OrderService {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        store: Arc<dyn OrderStore>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        idempotency: Arc<dyn IdempotencyStore>,
        notifier: Arc<dyn Notifier>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            catalog,
            store,
            gateway,
            idempotency,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &OrderSettings {
        &self.settings
    }

    pub fn payments_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    fn gateway(&self) -> OrderResult<&Arc<dyn PaymentGateway>> {
        self.gateway.as_ref().ok_or(OrderError::PaymentUnavailable)
    }

    /// Storage reachability, for health reporting
    pub async fn storage_reachable(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}
