//! Realtime message types
//!
//! Pushed to subscribers of a single order's topic whenever its status
//! changes. The wire shape is `{orderId, status, message}`.

use serde::{Deserialize, Serialize};

use crate::models::order::OrderStatus;

/// Topic prefix for per-order status channels
pub const ORDER_TOPIC_PREFIX: &str = "order:";

/// Topic name scoped to one order
pub fn order_topic(order_id: i64) -> String {
    format!("{ORDER_TOPIC_PREFIX}{order_id}")
}

/// Status-change notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusMessage {
    pub order_id: i64,
    pub status: OrderStatus,
    pub message: Option<String>,
}

impl OrderStatusMessage {
    pub fn new(order_id: i64, status: OrderStatus, message: Option<String>) -> Self {
        Self {
            order_id,
            status,
            message,
        }
    }

    /// Topic this message is broadcast on
    pub fn topic(&self) -> String {
        order_topic(self.order_id)
    }
}
