//! Order status state machine
//!
//! Every change runs in one transaction that holds the order's row lock:
//! lock, decide, write status + history, commit, then notify. Admin
//! transitions may skip intermediate states; only terminal orders refuse.

use shared::error::AppError;
use shared::message::OrderStatusMessage;
use shared::models::{Order, OrderStatus, PaymentStatus, StatusEvent};
use shared::order::StatusTransitionRequest;
use shared::util::{now_millis, snowflake_id};

use super::OrderService;
use crate::db::OrderTx;
use crate::error::{OrderError, OrderResult};

/// Maximum length of a status description or cancel reason
const MAX_DESCRIPTION_LEN: usize = 500;

const DEFAULT_CANCEL_REASON: &str = "Order cancelled";

/// What to do with a locked order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Precheck {
    /// Write the new status and a history event, then notify
    Apply,
    /// Record the payment outcome only; status and history are untouched
    PaymentOnly,
    /// Nothing to do
    Skip,
}

/// A requested status change
#[derive(Debug, Clone)]
pub(crate) struct StatusChange {
    pub target: OrderStatus,
    /// `None` keeps the current payment status
    pub payment_status: Option<PaymentStatus>,
    pub description: Option<String>,
    pub actor_id: Option<String>,
}

/// Only terminal orders reject a transition
pub fn check_transition(current: OrderStatus, target: OrderStatus) -> OrderResult<()> {
    if current.is_terminal() {
        return Err(OrderError::InvalidTransition { current, target });
    }
    Ok(())
}

pub fn check_cancellable(current: OrderStatus) -> OrderResult<()> {
    if current.is_terminal() {
        return Err(OrderError::NotCancellable(current));
    }
    Ok(())
}

fn clean_description(field: &str, value: Option<&str>) -> OrderResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::validation(format!(
            "{field} exceeds {MAX_DESCRIPTION_LEN} characters"
        ))
        .with_detail("field", field)
        .into());
    }
    Ok(Some(value.to_string()))
}

impl OrderService {
    /// Admin status transition
    pub async fn transition_status(
        &self,
        order_id: i64,
        req: &StatusTransitionRequest,
        actor_id: Option<&str>,
    ) -> OrderResult<Order> {
        let change = StatusChange {
            target: req.status,
            payment_status: None,
            description: clean_description("description", req.description.as_deref())?,
            actor_id: actor_id.map(String::from),
        };
        self.apply_change(order_id, change, |order| {
            check_transition(order.status, req.status).map(|()| Precheck::Apply)
        })
        .await
    }

    /// Admin cancel
    pub async fn cancel_order(
        &self,
        order_id: i64,
        reason: Option<&str>,
        actor_id: Option<&str>,
    ) -> OrderResult<Order> {
        let reason = clean_description("reason", reason)?
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
        let change = StatusChange {
            target: OrderStatus::Cancelled,
            payment_status: None,
            description: Some(reason),
            actor_id: actor_id.map(String::from),
        };
        self.apply_change(order_id, change, |order| {
            check_cancellable(order.status).map(|()| Precheck::Apply)
        })
        .await
    }

    /// Lock the order, let `precheck` decide, and apply the change atomically
    pub(crate) async fn apply_change<F>(
        &self,
        order_id: i64,
        change: StatusChange,
        precheck: F,
    ) -> OrderResult<Order>
    where
        F: FnOnce(&Order) -> OrderResult<Precheck> + Send,
    {
        let mut tx = self.store.begin().await?;

        let (order, decision) =
            match Self::write_change(tx.as_mut(), order_id, &change, precheck).await {
                Ok(written) => written,
                Err(e) => {
                    if let Err(rb) = tx.rollback().await {
                        tracing::warn!(order_id, error = %rb, "Status rollback failed");
                    }
                    return Err(e);
                }
            };

        if decision == Precheck::Skip {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(order_id, error = %rb, "Status rollback failed");
            }
            return Ok(order);
        }

        tx.commit().await?;

        match decision {
            Precheck::Apply => {
                tracing::info!(
                    order_id,
                    status = %order.status,
                    payment_status = order.payment_status.as_db(),
                    actor_id = change.actor_id.as_deref(),
                    "Order status changed"
                );
                self.notifier.emit(OrderStatusMessage::new(
                    order.id,
                    order.status,
                    change.description,
                ));
            }
            Precheck::PaymentOnly => tracing::info!(
                order_id,
                status = %order.status,
                payment_status = order.payment_status.as_db(),
                "Payment status recorded"
            ),
            Precheck::Skip => {}
        }

        Ok(order)
    }

    async fn write_change<F>(
        tx: &mut dyn OrderTx,
        order_id: i64,
        change: &StatusChange,
        precheck: F,
    ) -> OrderResult<(Order, Precheck)>
    where
        F: FnOnce(&Order) -> OrderResult<Precheck> + Send,
    {
        let Some(mut order) = tx.lock_order(order_id).await? else {
            return Err(OrderError::OrderNotFound(order_id.to_string()));
        };

        let decision = precheck(&order)?;
        let now = now_millis();
        let payment_status = change.payment_status.unwrap_or(order.payment_status);

        match decision {
            Precheck::Skip => return Ok((order, decision)),
            Precheck::PaymentOnly => {
                tx.update_status(order.id, order.status, payment_status, now)
                    .await?;
            }
            Precheck::Apply => {
                tx.update_status(order.id, change.target, payment_status, now)
                    .await?;
                tx.insert_status_event(&StatusEvent {
                    id: snowflake_id(),
                    order_id: order.id,
                    status: change.target,
                    description: change.description.clone(),
                    actor_id: change.actor_id.clone(),
                    created_at: now,
                })
                .await?;
                order.status = change.target;
            }
        }

        order.payment_status = payment_status;
        order.updated_at = now;
        Ok((order, decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestHarness;
    use shared::error::ErrorCode;
    use shared::models::PaymentMethod;

    fn to(status: OrderStatus) -> StatusTransitionRequest {
        StatusTransitionRequest {
            status,
            description: None,
        }
    }

    #[test]
    fn only_terminal_states_reject() {
        assert!(check_transition(OrderStatus::Pending, OrderStatus::Ready).is_ok());
        assert!(check_transition(OrderStatus::Ready, OrderStatus::Confirmed).is_ok());
        assert!(matches!(
            check_transition(OrderStatus::Delivered, OrderStatus::Ready),
            Err(OrderError::InvalidTransition { .. })
        ));
        assert!(check_cancellable(OrderStatus::Delivering).is_ok());
        assert!(matches!(
            check_cancellable(OrderStatus::Cancelled),
            Err(OrderError::NotCancellable(OrderStatus::Cancelled))
        ));
    }

    #[tokio::test]
    async fn transition_records_event_and_notifies() {
        let h = TestHarness::new();
        let order = h.place(PaymentMethod::Cash).await;

        let req = StatusTransitionRequest {
            status: OrderStatus::Ready,
            description: Some("  Out of the oven ".into()),
        };
        let updated = h
            .service
            .transition_status(order.id, &req, Some("staff-7"))
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Ready);
        assert_eq!(h.store.order(order.id).unwrap().status, OrderStatus::Ready);

        let events = h.store.events_for(order.id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, OrderStatus::Ready);
        assert_eq!(events[1].description.as_deref(), Some("Out of the oven"));
        assert_eq!(events[1].actor_id.as_deref(), Some("staff-7"));

        let last = h.notifier.messages().pop().unwrap();
        assert_eq!(last.order_id, order.id);
        assert_eq!(last.status, OrderStatus::Ready);
        assert_eq!(last.message.as_deref(), Some("Out of the oven"));
    }

    #[tokio::test]
    async fn terminal_order_rejects_transition_without_event() {
        let h = TestHarness::new();
        let order = h.place(PaymentMethod::Cash).await;
        h.service
            .transition_status(order.id, &to(OrderStatus::Delivered), None)
            .await
            .unwrap();

        let err = h
            .service
            .transition_status(order.id, &to(OrderStatus::Preparing), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                current: OrderStatus::Delivered,
                target: OrderStatus::Preparing
            }
        ));
        assert_eq!(h.store.events_for(order.id).len(), 2);
        assert_eq!(h.store.order(order.id).unwrap().status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn cancel_uses_reason_or_default() {
        let h = TestHarness::new();
        let first = h.place(PaymentMethod::Cash).await;
        let second = h.place(PaymentMethod::Card).await;

        h.service
            .cancel_order(first.id, Some("Customer called"), Some("staff-1"))
            .await
            .unwrap();
        let cancelled = h.service.cancel_order(second.id, None, None).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let first_events = h.store.events_for(first.id);
        assert_eq!(first_events[1].status, OrderStatus::Cancelled);
        assert_eq!(first_events[1].description.as_deref(), Some("Customer called"));
        let second_events = h.store.events_for(second.id);
        assert_eq!(
            second_events[1].description.as_deref(),
            Some(DEFAULT_CANCEL_REASON)
        );
    }

    #[tokio::test]
    async fn cancel_on_terminal_order_is_rejected_without_event() {
        let h = TestHarness::new();
        let delivered = h.place(PaymentMethod::Cash).await;
        h.service
            .transition_status(delivered.id, &to(OrderStatus::Delivered), None)
            .await
            .unwrap();
        let cancelled = h.place(PaymentMethod::Cash).await;
        h.service.cancel_order(cancelled.id, None, None).await.unwrap();
        let events_before = h.store.event_count();
        let emitted_before = h.notifier.messages().len();

        for (id, status) in [
            (delivered.id, OrderStatus::Delivered),
            (cancelled.id, OrderStatus::Cancelled),
        ] {
            let err = h.service.cancel_order(id, Some("late"), None).await.unwrap_err();
            assert!(matches!(err, OrderError::NotCancellable(s) if s == status));
        }
        assert_eq!(h.store.event_count(), events_before);
        assert_eq!(h.notifier.messages().len(), emitted_before);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let h = TestHarness::new();
        let err = h
            .service
            .transition_status(404, &to(OrderStatus::Ready), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound(_)));
        let err = h.service.cancel_order(404, None, None).await.unwrap_err();
        assert_eq!(AppError::from(err).code, ErrorCode::OrderNotFound);
    }

    #[tokio::test]
    async fn overlong_description_is_rejected_before_locking() {
        let h = TestHarness::new();
        let order = h.place(PaymentMethod::Cash).await;
        let req = StatusTransitionRequest {
            status: OrderStatus::Ready,
            description: Some("x".repeat(MAX_DESCRIPTION_LEN + 1)),
        };
        let err = h
            .service
            .transition_status(order.id, &req, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Invalid(_)));
        assert_eq!(h.store.events_for(order.id).len(), 1);
    }

    #[tokio::test]
    async fn concurrent_transitions_serialize_on_the_row_lock() {
        let h = TestHarness::new();
        let order = h.place(PaymentMethod::Cash).await;

        let deliver_req = to(OrderStatus::Delivered);
        let cancel = h.service.cancel_order(order.id, None, None);
        let deliver = h.service.transition_status(order.id, &deliver_req, None);
        let (cancelled, delivered) = tokio::join!(cancel, deliver);

        // Whichever ran second saw a terminal order
        assert!(cancelled.is_ok() ^ delivered.is_ok());
        assert_eq!(h.store.events_for(order.id).len(), 2);
    }
}
