//! Storage layer
//!
//! Two seams sit between the order engine and PostgreSQL:
//!
//! - [`CatalogReader`]: read-only product and option lookups used for pricing
//! - [`OrderStore`]: order reads plus [`OrderTx`], the unit-of-work that makes
//!   a checkout or a status transition atomic
//!
//! Every failure is classified into a [`StorageError`] here, once, so the
//! orchestrators only need to ask whether storage is reachable.

pub mod catalog;
pub mod orders;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{Order, OrderLine, OrderLineOption, OrderStatus, PaymentStatus, StatusEvent};
use thiserror::Error;

pub use catalog::PgCatalog;
pub use orders::PgOrderStore;

/// Storage failure, classified at the boundary
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection refused, pool exhausted, host unreachable, TLS failure
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("{0} not found")]
    NotFound(String),
    /// Any other database error (constraint violation, bad data, ...)
    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// SQLSTATE classes that mean the server could not be reached or went away
fn is_connectivity_sqlstate(code: &str) -> bool {
    // 08xxx connection exception, 57P01..57P03 shutdown / cannot connect now
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StorageError::Unavailable(e.to_string()),
            sqlx::Error::Database(db)
                if db.code().is_some_and(|c| is_connectivity_sqlstate(&c)) =>
            {
                StorageError::Unavailable(e.to_string())
            }
            sqlx::Error::RowNotFound => StorageError::NotFound("row".into()),
            _ => StorageError::Database(e.to_string()),
        }
    }
}

/// Active catalog product
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub is_active: bool,
}

/// Option value joined with its parent option (name and owning product)
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogOptionValue {
    pub id: i64,
    pub option_id: i64,
    pub product_id: i64,
    pub option_name: String,
    pub name: String,
    pub price_adjustment: Decimal,
}

/// Read-only catalog lookups
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Products with the given IDs (inactive ones included, unknown ones omitted)
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogProduct>, StorageError>;

    /// Option values with the given IDs (unknown ones omitted)
    async fn option_values_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<CatalogOptionValue>, StorageError>;
}

/// Customer contact used for find-or-create by email
#[derive(Debug, Clone)]
pub struct CustomerContact<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
}

/// Order reads outside of a transaction
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> Result<Box<dyn OrderTx>, StorageError>;

    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, StorageError>;

    async fn find_order_by_number(&self, order_number: &str)
    -> Result<Option<Order>, StorageError>;

    async fn find_order_by_intent(&self, intent_id: &str) -> Result<Option<Order>, StorageError>;

    /// Lines with their selected options, in insertion order
    async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, StorageError>;

    /// Status history, oldest first
    async fn status_history(&self, order_id: i64) -> Result<Vec<StatusEvent>, StorageError>;

    /// Cheap reachability probe
    async fn ping(&self) -> Result<(), StorageError>;
}

/// Unit of work over the order tables
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait OrderTx: Send {
    /// Find a customer by email, creating one if none exists. Returns the customer ID.
    async fn upsert_customer(&mut self, contact: &CustomerContact<'_>) -> Result<i64, StorageError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), StorageError>;

    /// Insert a line header (its `options` are written separately)
    async fn insert_line(&mut self, line: &OrderLine) -> Result<(), StorageError>;

    async fn insert_line_option(&mut self, option: &OrderLineOption) -> Result<(), StorageError>;

    async fn insert_status_event(&mut self, event: &StatusEvent) -> Result<(), StorageError>;

    async fn set_payment_intent(
        &mut self,
        order_id: i64,
        intent_id: &str,
        now: i64,
    ) -> Result<(), StorageError>;

    /// Read the order and hold a row lock until commit/rollback
    async fn lock_order(&mut self, order_id: i64) -> Result<Option<Order>, StorageError>;

    async fn update_status(
        &mut self,
        order_id: i64,
        status: OrderStatus,
        payment_status: PaymentStatus,
        now: i64,
    ) -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
