//! OrderEventHub: realtime order status fan-out
//!
//! ```text
//! status transition / webhook
//!       │ OrderStatusMessage
//!       ▼
//! OrderEventHub
//!   └── topics: "order:{id}" → broadcast::Sender
//!         │
//!         ▼
//!   subscribers (customer tracking page, kitchen display)
//! ```
//!
//! Emission never blocks and never fails the caller: with no subscribers
//! the message is dropped.

use dashmap::DashMap;
use shared::message::{OrderStatusMessage, order_topic};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel capacity per topic
const BROADCAST_CAPACITY: usize = 64;

/// Realtime notifier, called after a transition has committed
pub trait Notifier: Send + Sync {
    fn emit(&self, message: OrderStatusMessage);
}

/// Per-order broadcast hub
#[derive(Clone, Default)]
pub struct OrderEventHub {
    /// topic → sender
    topics: Arc<DashMap<String, broadcast::Sender<OrderStatusMessage>>>,
}

impl OrderEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one order's status changes
    pub fn subscribe(&self, order_id: i64) -> broadcast::Receiver<OrderStatusMessage> {
        self.topics
            .entry(order_topic(order_id))
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, order_id: i64) -> usize {
        self.topics
            .get(&order_topic(order_id))
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop topics nobody listens to any more
    pub fn prune(&self) {
        self.topics.retain(|_, tx| tx.receiver_count() > 0);
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Notifier for OrderEventHub {
    fn emit(&self, message: OrderStatusMessage) {
        let topic = message.topic();
        match self.topics.get(&topic) {
            Some(tx) => {
                // Err only when every receiver is gone
                let delivered = tx.send(message).unwrap_or(0);
                tracing::debug!(topic = %topic, delivered, "Order status broadcast");
            }
            None => tracing::debug!(topic = %topic, "No subscribers for order status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::OrderStatus;

    #[tokio::test]
    async fn subscribers_receive_their_order_only() {
        let hub = OrderEventHub::new();
        let mut rx1 = hub.subscribe(1);
        let mut rx2 = hub.subscribe(2);

        hub.emit(OrderStatusMessage::new(1, OrderStatus::Confirmed, None));

        let msg = rx1.recv().await.unwrap();
        assert_eq!(msg.order_id, 1);
        assert_eq!(msg.status, OrderStatus::Confirmed);
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let hub = OrderEventHub::new();
        hub.emit(OrderStatusMessage::new(9, OrderStatus::Ready, Some("Ready".into())));
        assert_eq!(hub.topic_count(), 0);
    }

    #[test]
    fn prune_removes_abandoned_topics() {
        let hub = OrderEventHub::new();
        let rx = hub.subscribe(3);
        assert_eq!(hub.subscriber_count(3), 1);
        drop(rx);
        hub.prune();
        assert_eq!(hub.topic_count(), 0);
    }
}
