//! In-memory catalog and order store for tests
//!
//! Transactions stage their writes and apply them on commit, so a dropped or
//! rolled-back transaction leaves no trace. `lock_order` takes a store-wide
//! lock held until the transaction ends, standing in for `SELECT ... FOR UPDATE`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{
    Order, OrderLine, OrderLineOption, OrderStatus, PaymentStatus, StatusEvent,
};
use shared::util::snowflake_id;
use tokio::sync::OwnedMutexGuard;

use super::{
    CatalogOptionValue, CatalogProduct, CatalogReader, CustomerContact, OrderStore, OrderTx,
    StorageError,
};

#[derive(Debug, Clone)]
pub struct MemoryCustomer {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Default)]
struct Tables {
    products: HashMap<i64, CatalogProduct>,
    option_values: HashMap<i64, CatalogOptionValue>,
    customers: Vec<MemoryCustomer>,
    orders: BTreeMap<i64, Order>,
    lines: Vec<OrderLine>,
    line_options: Vec<OrderLineOption>,
    events: Vec<StatusEvent>,
}

/// Injected failure points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// `insert_line` returns a database error
    LineInsert,
    /// `commit` reports the connection as lost
    Commit,
    /// `commit` is refused by the server (serialization failure, constraint)
    CommitRejected,
}

struct Inner {
    tables: Mutex<Tables>,
    row_lock: Arc<tokio::sync::Mutex<()>>,
    available: AtomicBool,
    fail_point: Mutex<Option<FailPoint>>,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                row_lock: Arc::new(tokio::sync::Mutex::new(())),
                available: AtomicBool::new(true),
                fail_point: Mutex::new(None),
            }),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.tables.lock().unwrap()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("connection refused".into()))
        }
    }

    fn hits(&self, point: FailPoint) -> bool {
        *self.inner.fail_point.lock().unwrap() == Some(point)
    }

    // ── Test controls ──

    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn fail_at(&self, point: Option<FailPoint>) {
        *self.inner.fail_point.lock().unwrap() = point;
    }

    pub fn add_product(&self, id: i64, name: &str, price: Decimal) {
        self.tables().products.insert(
            id,
            CatalogProduct {
                id,
                name: name.into(),
                price,
                is_active: true,
            },
        );
    }

    pub fn deactivate_product(&self, id: i64) {
        if let Some(p) = self.tables().products.get_mut(&id) {
            p.is_active = false;
        }
    }

    pub fn add_option_value(
        &self,
        id: i64,
        option_id: i64,
        product_id: i64,
        option_name: &str,
        name: &str,
        price_adjustment: Decimal,
    ) {
        self.tables().option_values.insert(
            id,
            CatalogOptionValue {
                id,
                option_id,
                product_id,
                option_name: option_name.into(),
                name: name.into(),
                price_adjustment,
            },
        );
    }

    // ── Inspection ──

    pub fn orders(&self) -> Vec<Order> {
        self.tables().orders.values().cloned().collect()
    }

    pub fn order(&self, id: i64) -> Option<Order> {
        self.tables().orders.get(&id).cloned()
    }

    pub fn line_count(&self) -> usize {
        self.tables().lines.len()
    }

    pub fn line_option_count(&self) -> usize {
        self.tables().line_options.len()
    }

    pub fn customers(&self) -> Vec<MemoryCustomer> {
        self.tables().customers.clone()
    }

    pub fn events_for(&self, order_id: i64) -> Vec<StatusEvent> {
        self.tables()
            .events
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.tables().events.len()
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogProduct>, StorageError> {
        self.check_available()?;
        let tables = self.tables();
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn option_values_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<CatalogOptionValue>, StorageError> {
        self.check_available()?;
        let tables = self.tables();
        Ok(ids
            .iter()
            .filter_map(|id| tables.option_values.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>, StorageError> {
        self.check_available()?;
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            staged: Tables::default(),
            row_lock: None,
        }))
    }

    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, StorageError> {
        self.check_available()?;
        Ok(self.order(order_id))
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, StorageError> {
        self.check_available()?;
        Ok(self
            .tables()
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn find_order_by_intent(&self, intent_id: &str) -> Result<Option<Order>, StorageError> {
        self.check_available()?;
        Ok(self
            .tables()
            .orders
            .values()
            .find(|o| o.payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, StorageError> {
        self.check_available()?;
        let tables = self.tables();
        Ok(tables
            .lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .map(|l| OrderLine {
                options: tables
                    .line_options
                    .iter()
                    .filter(|o| o.order_line_id == l.id)
                    .cloned()
                    .collect(),
                ..l.clone()
            })
            .collect())
    }

    async fn status_history(&self, order_id: i64) -> Result<Vec<StatusEvent>, StorageError> {
        self.check_available()?;
        Ok(self.events_for(order_id))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check_available()
    }
}

pub struct MemoryTx {
    store: MemoryStore,
    staged: Tables,
    row_lock: Option<OwnedMutexGuard<()>>,
}

impl MemoryTx {
    fn current_order(&self, order_id: i64) -> Option<Order> {
        self.staged
            .orders
            .get(&order_id)
            .cloned()
            .or_else(|| self.store.order(order_id))
    }
}

#[async_trait]
impl OrderTx for MemoryTx {
    async fn upsert_customer(&mut self, contact: &CustomerContact<'_>) -> Result<i64, StorageError> {
        self.store.check_available()?;
        let existing = self
            .store
            .tables()
            .customers
            .iter()
            .chain(self.staged.customers.iter())
            .find(|c| c.email == contact.email)
            .map(|c| c.id);
        if let Some(id) = existing {
            return Ok(id);
        }
        let id = snowflake_id();
        self.staged.customers.push(MemoryCustomer {
            id,
            name: contact.name.into(),
            phone: contact.phone.into(),
            email: contact.email.into(),
        });
        Ok(id)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StorageError> {
        self.store.check_available()?;
        let duplicate = self
            .store
            .tables()
            .orders
            .values()
            .any(|o| o.order_number == order.order_number);
        if duplicate {
            return Err(StorageError::Database("duplicate order_number".into()));
        }
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_line(&mut self, line: &OrderLine) -> Result<(), StorageError> {
        self.store.check_available()?;
        if self.store.hits(FailPoint::LineInsert) {
            return Err(StorageError::Database("check constraint violated".into()));
        }
        self.staged.lines.push(OrderLine {
            options: Vec::new(),
            ..line.clone()
        });
        Ok(())
    }

    async fn insert_line_option(&mut self, option: &OrderLineOption) -> Result<(), StorageError> {
        self.store.check_available()?;
        self.staged.line_options.push(option.clone());
        Ok(())
    }

    async fn insert_status_event(&mut self, event: &StatusEvent) -> Result<(), StorageError> {
        self.store.check_available()?;
        self.staged.events.push(event.clone());
        Ok(())
    }

    async fn set_payment_intent(
        &mut self,
        order_id: i64,
        intent_id: &str,
        now: i64,
    ) -> Result<(), StorageError> {
        self.store.check_available()?;
        let mut order = self
            .current_order(order_id)
            .ok_or_else(|| StorageError::NotFound(format!("order {order_id}")))?;
        order.payment_intent_id = Some(intent_id.to_string());
        order.updated_at = now;
        self.staged.orders.insert(order_id, order);
        Ok(())
    }

    async fn lock_order(&mut self, order_id: i64) -> Result<Option<Order>, StorageError> {
        self.store.check_available()?;
        if self.row_lock.is_none() {
            self.row_lock = Some(self.store.inner.row_lock.clone().lock_owned().await);
        }
        Ok(self.current_order(order_id))
    }

    async fn update_status(
        &mut self,
        order_id: i64,
        status: OrderStatus,
        payment_status: PaymentStatus,
        now: i64,
    ) -> Result<(), StorageError> {
        self.store.check_available()?;
        let mut order = self
            .current_order(order_id)
            .ok_or_else(|| StorageError::NotFound(format!("order {order_id}")))?;
        order.status = status;
        order.payment_status = payment_status;
        order.updated_at = now;
        self.staged.orders.insert(order_id, order);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.store.check_available()?;
        if self.store.hits(FailPoint::Commit) {
            return Err(StorageError::Unavailable("connection reset during commit".into()));
        }
        if self.store.hits(FailPoint::CommitRejected) {
            return Err(StorageError::Database("could not serialize access".into()));
        }
        let MemoryTx {
            store,
            staged,
            row_lock,
        } = *self;
        {
            let mut tables = store.tables();
            tables.customers.extend(staged.customers);
            tables.orders.extend(staged.orders);
            tables.lines.extend(staged.lines);
            tables.line_options.extend(staged.line_options);
            tables.events.extend(staged.events);
        }
        drop(row_lock);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shared::models::{DeliveryMethod, PaymentMethod};

    fn order(id: i64) -> Order {
        Order {
            id,
            order_number: format!("ORD-20260101-{id:06}"),
            customer_id: None,
            customer_name: "Ana".into(),
            customer_phone: "600".into(),
            customer_email: None,
            delivery_method: DeliveryMethod::Pickup,
            delivery_address: None,
            delivery_instructions: None,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Unpaid,
            subtotal: dec!(10),
            delivery_charge: dec!(0),
            total: dec!(10),
            status: OrderStatus::Pending,
            payment_intent_id: None,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_order(&order(1)).await.unwrap();
        }
        assert!(store.orders().is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order(2)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.orders().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_refuses_everything() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(store.begin().await.err().unwrap().is_unavailable());
        assert!(store.products_by_ids(&[1]).await.unwrap_err().is_unavailable());
        assert!(store.ping().await.unwrap_err().is_unavailable());
    }
}
