//! Payment reconciliation
//!
//! Two paths move an online order out of `pending`:
//!
//! - client confirmation: re-fetch the intent and trust only `succeeded`
//! - gateway webhooks: verify, parse, claim the event ID, apply
//!
//! Both land in the same locked transition, so a confirmation racing a
//! webhook for the same intent writes a single history event.

use shared::error::AppError;
use shared::models::{Order, OrderStatus, PaymentStatus};

use super::OrderService;
use super::status::{Precheck, StatusChange};
use crate::error::{OrderError, OrderResult};
use crate::stripe::{
    IntentStatus, WebhookEvent, WebhookEventKind, is_valid_intent_id, parse_webhook_event,
};

/// What happened to a webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event reconciled against its order
    Applied,
    /// Event ID already processed
    Duplicate,
    /// Event type this service does not act on
    Ignored,
    /// No order references the event's payment intent
    UnknownIntent,
}

impl OrderService {
    /// Client-initiated payment confirmation
    ///
    /// The gateway is asked for the intent's status; the client's word is
    /// never taken for it.
    pub async fn confirm_payment(&self, intent_id: &str) -> OrderResult<Order> {
        let gateway = self.gateway()?;
        let intent_id = intent_id.trim();
        if !is_valid_intent_id(intent_id) {
            return Err(AppError::validation("payment_intent_id is not a payment intent reference")
                .with_detail("field", "payment_intent_id")
                .into());
        }

        let order = self
            .store
            .find_order_by_intent(intent_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(intent_id.to_string()))?;
        if order.payment_status == PaymentStatus::Paid {
            return Ok(order);
        }

        let status = gateway
            .retrieve_intent(intent_id)
            .await
            .map_err(OrderError::PaymentProcessing)?;
        if status != IntentStatus::Succeeded {
            tracing::info!(order_id = order.id, intent_id, status = %status, "Payment not completed");
            return Err(OrderError::PaymentNotCompleted {
                intent_id: intent_id.to_string(),
                status,
            });
        }

        self.record_payment_success(order.id, "Payment confirmed")
            .await
    }

    /// Verify and reconcile a raw gateway webhook
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        sig_header: Option<&str>,
    ) -> OrderResult<WebhookOutcome> {
        let gateway = self.gateway()?;

        let Some(sig_header) = sig_header else {
            tracing::warn!("Webhook without Stripe-Signature header");
            return Err(OrderError::InvalidSignature("Missing Stripe-Signature header"));
        };
        if let Err(reason) = gateway.verify_webhook(payload, sig_header) {
            tracing::warn!(reason, "Webhook signature verification failed");
            return Err(OrderError::InvalidSignature(reason));
        }

        let event = parse_webhook_event(payload).map_err(OrderError::InvalidPayload)?;

        let ttl = self.settings.idempotency_ttl;
        let claimed = match self.idempotency.try_mark(&event.id, ttl).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::info!(event_id = %event.id, "Duplicate webhook event, skipping");
                return Ok(WebhookOutcome::Duplicate);
            }
            Err(e) => {
                // Payment transitions are idempotent; carry on without the marker
                tracing::warn!(event_id = %event.id, error = %e, "Idempotency store unavailable");
                false
            }
        };

        // Detached so a dropped request (timeout, disconnect) cannot strand a claimed marker
        let event_id = event.id.clone();
        let service = self.clone();
        let task = tokio::spawn(async move {
            let result = service.apply_webhook_event(&event).await;
            if let Err(e) = &result {
                tracing::error!(event_id = %event.id, error = %e, "Webhook processing failed");
                if claimed {
                    service.release_marker(&event.id).await;
                }
            }
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Webhook task aborted");
                if claimed {
                    self.release_marker(&event_id).await;
                }
                Err(OrderError::Aborted(e))
            }
        }
    }

    async fn release_marker(&self, event_id: &str) {
        if let Err(e) = self.idempotency.release(event_id).await {
            tracing::warn!(event_id, error = %e, "Failed to release webhook marker");
        }
    }

    async fn apply_webhook_event(&self, event: &WebhookEvent) -> OrderResult<WebhookOutcome> {
        let (intent_id, failure) = match &event.kind {
            WebhookEventKind::PaymentSucceeded { intent_id } => (intent_id, None),
            WebhookEventKind::PaymentFailed { intent_id, message } => {
                (intent_id, Some(message.as_deref()))
            }
            WebhookEventKind::Other(event_type) => {
                tracing::debug!(event_id = %event.id, event_type = %event_type, "Ignoring webhook event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let Some(order) = self.store.find_order_by_intent(intent_id).await? else {
            tracing::warn!(
                event_id = %event.id,
                intent_id = %intent_id,
                "Webhook references unknown payment intent"
            );
            return Ok(WebhookOutcome::UnknownIntent);
        };

        match failure {
            None => {
                self.record_payment_success(order.id, "Payment succeeded")
                    .await?;
            }
            Some(message) => {
                self.record_payment_failure(order.id, message).await?;
            }
        }
        tracing::info!(event_id = %event.id, order_id = order.id, "Webhook event applied");
        Ok(WebhookOutcome::Applied)
    }

    /// `pending` → `confirmed` with payment `paid`
    ///
    /// A paid order is left alone. An order an admin already moved past
    /// `pending` only has its payment status recorded.
    async fn record_payment_success(&self, order_id: i64, description: &str) -> OrderResult<Order> {
        let change = StatusChange {
            target: OrderStatus::Confirmed,
            payment_status: Some(PaymentStatus::Paid),
            description: Some(description.to_string()),
            actor_id: None,
        };
        self.apply_change(order_id, change, |order| {
            Ok(match (order.payment_status, order.status) {
                (PaymentStatus::Paid, _) => Precheck::Skip,
                (_, OrderStatus::Pending) => Precheck::Apply,
                _ => Precheck::PaymentOnly,
            })
        })
        .await
    }

    /// Payment `failed`; the order stays `pending` so the customer can retry
    async fn record_payment_failure(
        &self,
        order_id: i64,
        message: Option<&str>,
    ) -> OrderResult<Order> {
        let description = match message.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => format!("Payment failed: {m}"),
            None => "Payment failed".to_string(),
        };
        let change = StatusChange {
            target: OrderStatus::Pending,
            payment_status: Some(PaymentStatus::Failed),
            description: Some(description),
            actor_id: None,
        };
        self.apply_change(order_id, change, |order| {
            Ok(match (order.payment_status, order.status) {
                (PaymentStatus::Paid, _) => Precheck::Skip,
                (_, OrderStatus::Pending) => Precheck::Apply,
                _ => Precheck::Skip,
            })
        })
        .await
    }
}
