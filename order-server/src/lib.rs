//! order-server: order lifecycle and payment reconciliation
//!
//! Storefront checkout with server-side pricing, admin status management,
//! Stripe payment confirmation and webhooks, and a degraded mode that keeps
//! taking orders while PostgreSQL is unreachable.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod idempotency;
pub mod live;
pub mod orders;
pub mod state;
pub mod stripe;

#[cfg(test)]
pub mod test_support;

pub use config::Config;
pub use state::AppState;
