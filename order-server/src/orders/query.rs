//! Order reads: admin detail and public tracking

use shared::models::{Order, OrderDetail};

use super::OrderService;
use crate::error::{OrderError, OrderResult};

impl OrderService {
    /// Order with lines, options and status history
    pub async fn order_detail(&self, order_id: i64) -> OrderResult<OrderDetail> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        self.load_detail(order).await
    }

    /// Lookup by the customer-facing order number
    pub async fn track_order(&self, order_number: &str) -> OrderResult<OrderDetail> {
        let order_number = order_number.trim();
        let order = self
            .store
            .find_order_by_number(order_number)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_number.to_string()))?;
        self.load_detail(order).await
    }

    async fn load_detail(&self, order: Order) -> OrderResult<OrderDetail> {
        let lines = self.store.order_lines(order.id).await?;
        let status_history = self.store.status_history(order.id).await?;
        Ok(OrderDetail {
            order,
            lines,
            status_history,
        })
    }
}
