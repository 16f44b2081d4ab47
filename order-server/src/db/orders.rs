//! Order persistence (orders, lines, options, status history, customers)

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{
    DeliveryMethod, Order, OrderLine, OrderLineOption, OrderStatus, PaymentMethod, PaymentStatus,
    StatusEvent,
};
use shared::util::snowflake_id;
use sqlx::{PgPool, Postgres, Transaction};

use super::{CustomerContact, OrderStore, OrderTx, StorageError};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, customer_name, customer_phone, \
     customer_email, delivery_method, delivery_address, delivery_instructions, payment_method, \
     payment_status, subtotal, delivery_charge, total, status, payment_intent_id, created_at, \
     updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    customer_id: Option<i64>,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    delivery_method: String,
    delivery_address: Option<String>,
    delivery_instructions: Option<String>,
    payment_method: String,
    payment_status: String,
    subtotal: Decimal,
    delivery_charge: Decimal,
    total: Decimal,
    status: String,
    payment_intent_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn bad_column(column: &str, value: &str) -> StorageError {
    StorageError::Database(format!("unexpected {column} value: {value}"))
}

impl TryFrom<OrderRow> for Order {
    type Error = StorageError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            delivery_method: DeliveryMethod::from_db(&r.delivery_method)
                .ok_or_else(|| bad_column("delivery_method", &r.delivery_method))?,
            payment_method: PaymentMethod::from_db(&r.payment_method)
                .ok_or_else(|| bad_column("payment_method", &r.payment_method))?,
            payment_status: PaymentStatus::from_db(&r.payment_status)
                .ok_or_else(|| bad_column("payment_status", &r.payment_status))?,
            status: OrderStatus::from_db(&r.status).ok_or_else(|| bad_column("status", &r.status))?,
            id: r.id,
            order_number: r.order_number,
            customer_id: r.customer_id,
            customer_name: r.customer_name,
            customer_phone: r.customer_phone,
            customer_email: r.customer_email,
            delivery_address: r.delivery_address,
            delivery_instructions: r.delivery_instructions,
            subtotal: r.subtotal,
            delivery_charge: r.delivery_charge,
            total: r.total,
            payment_intent_id: r.payment_intent_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

#[derive(sqlx::FromRow)]
struct LineOptionRow {
    id: i64,
    order_line_id: i64,
    option_id: i64,
    option_name: String,
    value_id: i64,
    value_name: String,
    price_adjustment: Decimal,
}

#[derive(sqlx::FromRow)]
struct StatusEventRow {
    id: i64,
    order_id: i64,
    status: String,
    description: Option<String>,
    actor_id: Option<String>,
    created_at: i64,
}

/// PostgreSQL-backed order store
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Order>, StorageError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgOrderTx { tx }))
    }

    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, StorageError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, StorageError> {
        self.find_one("order_number", order_number).await
    }

    async fn find_order_by_intent(&self, intent_id: &str) -> Result<Option<Order>, StorageError> {
        self.find_one("payment_intent_id", intent_id).await
    }

    async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, StorageError> {
        let lines: Vec<LineRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, product_name, unit_price, quantity, line_total
             FROM order_lines WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let line_ids: Vec<i64> = lines.iter().map(|l| l.id).collect();
        let options: Vec<LineOptionRow> = sqlx::query_as(
            "SELECT id, order_line_id, option_id, option_name, value_id, value_name, price_adjustment
             FROM order_line_options WHERE order_line_id = ANY($1) ORDER BY id",
        )
        .bind(&line_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_line: HashMap<i64, Vec<OrderLineOption>> = HashMap::new();
        for o in options {
            by_line.entry(o.order_line_id).or_default().push(OrderLineOption {
                id: o.id,
                order_line_id: o.order_line_id,
                option_id: o.option_id,
                option_name: o.option_name,
                value_id: o.value_id,
                value_name: o.value_name,
                price_adjustment: o.price_adjustment,
            });
        }

        Ok(lines
            .into_iter()
            .map(|l| OrderLine {
                options: by_line.remove(&l.id).unwrap_or_default(),
                id: l.id,
                order_id: l.order_id,
                product_id: l.product_id,
                product_name: l.product_name,
                unit_price: l.unit_price,
                quantity: l.quantity,
                line_total: l.line_total,
            })
            .collect())
    }

    async fn status_history(&self, order_id: i64) -> Result<Vec<StatusEvent>, StorageError> {
        let rows: Vec<StatusEventRow> = sqlx::query_as(
            "SELECT id, order_id, status, description, actor_id, created_at
             FROM order_status_events WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<StatusEvent, StorageError> {
                Ok(StatusEvent {
                    status: OrderStatus::from_db(&r.status)
                        .ok_or_else(|| bad_column("status", &r.status))?,
                    id: r.id,
                    order_id: r.order_id,
                    description: r.description,
                    actor_id: r.actor_id,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction
pub struct PgOrderTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTx for PgOrderTx {
    async fn upsert_customer(&mut self, contact: &CustomerContact<'_>) -> Result<i64, StorageError> {
        let now = shared::util::now_millis();
        // Existing customers keep their stored name and phone
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO customers (id, name, phone, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (email) DO UPDATE SET updated_at = EXCLUDED.updated_at
            RETURNING id
            "#,
        )
        .bind(snowflake_id())
        .bind(contact.name)
        .bind(contact.phone)
        .bind(contact.email)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, customer_name, customer_phone, customer_email,
                delivery_method, delivery_address, delivery_instructions, payment_method,
                payment_status, subtotal, delivery_charge, total, status, payment_intent_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_email)
        .bind(order.delivery_method.as_db())
        .bind(&order.delivery_address)
        .bind(&order.delivery_instructions)
        .bind(order.payment_method.as_db())
        .bind(order.payment_status.as_db())
        .bind(order.subtotal)
        .bind(order.delivery_charge)
        .bind(order.total)
        .bind(order.status.as_db())
        .bind(&order.payment_intent_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_line(&mut self, line: &OrderLine) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO order_lines (id, order_id, product_id, product_name, unit_price, quantity, line_total)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(line.id)
        .bind(line.order_id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.line_total)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_line_option(&mut self, option: &OrderLineOption) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO order_line_options
                (id, order_line_id, option_id, option_name, value_id, value_name, price_adjustment)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(option.id)
        .bind(option.order_line_id)
        .bind(option.option_id)
        .bind(&option.option_name)
        .bind(option.value_id)
        .bind(&option.value_name)
        .bind(option.price_adjustment)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_status_event(&mut self, event: &StatusEvent) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO order_status_events (id, order_id, status, description, actor_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.id)
        .bind(event.order_id)
        .bind(event.status.as_db())
        .bind(&event.description)
        .bind(&event.actor_id)
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_payment_intent(
        &mut self,
        order_id: i64,
        intent_id: &str,
        now: i64,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE orders SET payment_intent_id = $1, updated_at = $2 WHERE id = $3")
            .bind(intent_id)
            .bind(now)
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_order(&mut self, order_id: i64) -> Result<Option<Order>, StorageError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn update_status(
        &mut self,
        order_id: i64,
        status: OrderStatus,
        payment_status: PaymentStatus,
        now: i64,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, payment_status = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(status.as_db())
        .bind(payment_status.as_db())
        .bind(now)
        .bind(order_id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("order {order_id}")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
