//! Checkout: price, persist atomically, optionally open a payment intent
//!
//! ```text
//! validate ─► gateway check ─► price (2 reads) ─► BEGIN
//!   customer? ─► order ─► lines + options ─► status event ─► intent? ─► COMMIT ─► emit
//! ```
//!
//! A storage outage anywhere before commit downgrades the request to a
//! provisional order that is never persisted.

use rust_decimal::Decimal;
use shared::message::OrderStatusMessage;
use shared::models::{
    Order, OrderLine, OrderLineOption, OrderStatus, PaymentMethod, PaymentStatus, StatusEvent,
};
use shared::order::{CheckoutOrder, CheckoutRequest, CheckoutResponse, PaymentIntentInfo};
use shared::util::{now_millis, order_number, snowflake_id};

use super::OrderService;
use super::pricing::{self, PricedCart};
use crate::db::{CustomerContact, OrderTx};
use crate::error::{OrderError, OrderResult};
use crate::stripe::{IntentRequest, PaymentGateway, PaymentIntent};

/// Description of the first status event of every order
pub const ORDER_PLACED: &str = "Order placed";

/// Result of a checkout
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Order committed to storage
    Durable {
        order: Order,
        payment_intent: Option<PaymentIntent>,
    },
    /// Storage was unreachable; nothing was written
    Provisional(CheckoutOrder),
}

impl CheckoutOutcome {
    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        match outcome {
            CheckoutOutcome::Durable {
                order,
                payment_intent,
            } => CheckoutResponse {
                order: CheckoutOrder {
                    id: order.id,
                    order_number: order.order_number,
                    status: order.status,
                    total: order.total,
                },
                payment_intent: payment_intent.map(|pi| PaymentIntentInfo {
                    client_secret: pi.client_secret,
                    id: pi.id,
                }),
                fallback: false,
            },
            CheckoutOutcome::Provisional(order) => CheckoutResponse {
                order,
                payment_intent: None,
                fallback: true,
            },
        }
    }
}

impl OrderService {
    /// Place an order
    pub async fn checkout(&self, req: &CheckoutRequest) -> OrderResult<CheckoutOutcome> {
        req.validate()?;

        let gateway: Option<&dyn PaymentGateway> = match req.payment_method {
            PaymentMethod::Online => Some(self.gateway()?.as_ref()),
            PaymentMethod::Cash | PaymentMethod::Card => None,
        };

        match self.place_order(req, gateway).await {
            Err(e) if e.is_storage_unavailable() => {
                if gateway.is_some() {
                    tracing::warn!(error = %e, "Storage unavailable, rejecting online checkout");
                    return Err(OrderError::PaymentUnavailable);
                }
                Ok(Self::provisional(req, &e))
            }
            other => other,
        }
    }

    async fn place_order(
        &self,
        req: &CheckoutRequest,
        gateway: Option<&dyn PaymentGateway>,
    ) -> OrderResult<CheckoutOutcome> {
        let priced = pricing::resolve_cart(
            self.catalog.as_ref(),
            &req.order_items,
            req.delivery_method,
            self.settings.delivery_charge,
        )
        .await?;

        let mut tx = self.store.begin().await.map_err(OrderError::persistence)?;

        let (order, payment_intent) =
            match self.write_order(tx.as_mut(), req, &priced, gateway).await {
                Ok(written) => written,
                Err(e) => {
                    if let Err(rb) = tx.rollback().await {
                        tracing::warn!(error = %rb, "Checkout rollback failed");
                    }
                    return Err(e);
                }
            };

        if let Err(e) = tx.commit().await {
            if let (Some(gateway), Some(intent)) = (gateway, &payment_intent) {
                Self::cancel_orphan_intent(gateway, &intent.id).await;
            }
            return Err(OrderError::persistence(e));
        }

        tracing::info!(
            order_id = order.id,
            order_number = %order.order_number,
            total = %order.total,
            payment_method = order.payment_method.as_db(),
            "Order placed"
        );
        self.notifier.emit(OrderStatusMessage::new(
            order.id,
            OrderStatus::Pending,
            Some(ORDER_PLACED.to_string()),
        ));

        Ok(CheckoutOutcome::Durable {
            order,
            payment_intent,
        })
    }

    /// All writes of one checkout, inside the caller's transaction
    async fn write_order(
        &self,
        tx: &mut dyn OrderTx,
        req: &CheckoutRequest,
        priced: &PricedCart,
        gateway: Option<&dyn PaymentGateway>,
    ) -> OrderResult<(Order, Option<PaymentIntent>)> {
        let now = now_millis();

        let customer_id = match req.contact_email() {
            Some(email) => Some(
                tx.upsert_customer(&CustomerContact {
                    name: req.customer_name.trim(),
                    phone: req.customer_phone.trim(),
                    email,
                })
                .await
                .map_err(OrderError::persistence)?,
            ),
            None => None,
        };

        let mut order = Order {
            id: snowflake_id(),
            order_number: order_number(),
            customer_id,
            customer_name: req.customer_name.trim().to_string(),
            customer_phone: req.customer_phone.trim().to_string(),
            customer_email: req.contact_email().map(String::from),
            delivery_method: req.delivery_method,
            delivery_address: req.effective_delivery_address().map(String::from),
            delivery_instructions: req
                .delivery_instructions
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            payment_method: req.payment_method,
            payment_status: PaymentStatus::Unpaid,
            subtotal: priced.subtotal,
            delivery_charge: priced.delivery_charge,
            total: priced.total,
            status: OrderStatus::Pending,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_order(&order)
            .await
            .map_err(OrderError::persistence)?;

        for line in &priced.lines {
            let line_id = snowflake_id();
            tx.insert_line(&OrderLine {
                id: line_id,
                order_id: order.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total,
                options: Vec::new(),
            })
            .await
            .map_err(OrderError::persistence)?;

            for opt in &line.options {
                tx.insert_line_option(&OrderLineOption {
                    id: snowflake_id(),
                    order_line_id: line_id,
                    option_id: opt.option_id,
                    option_name: opt.option_name.clone(),
                    value_id: opt.value_id,
                    value_name: opt.value_name.clone(),
                    price_adjustment: opt.price_adjustment,
                })
                .await
                .map_err(OrderError::persistence)?;
            }
        }

        tx.insert_status_event(&StatusEvent {
            id: snowflake_id(),
            order_id: order.id,
            status: OrderStatus::Pending,
            description: Some(ORDER_PLACED.to_string()),
            actor_id: None,
            created_at: now,
        })
        .await
        .map_err(OrderError::persistence)?;

        let Some(gateway) = gateway else {
            return Ok((order, None));
        };

        let intent = gateway
            .create_intent(&IntentRequest {
                amount: order.total,
                currency: &self.settings.currency,
                order_id: order.id,
                order_number: &order.order_number,
                receipt_email: order.customer_email.as_deref(),
            })
            .await
            .map_err(OrderError::PaymentProcessing)?;

        if let Err(e) = tx.set_payment_intent(order.id, &intent.id, now).await {
            Self::cancel_orphan_intent(gateway, &intent.id).await;
            return Err(OrderError::persistence(e));
        }
        order.payment_intent_id = Some(intent.id.clone());

        Ok((order, Some(intent)))
    }

    /// Best-effort cancel of an intent whose order was rolled back
    async fn cancel_orphan_intent(gateway: &dyn PaymentGateway, intent_id: &str) {
        match gateway.cancel_intent(intent_id).await {
            Ok(()) => tracing::info!(intent_id, "Cancelled payment intent of rolled-back order"),
            Err(e) => tracing::error!(
                intent_id,
                error = %e,
                "Failed to cancel payment intent of rolled-back order"
            ),
        }
    }

    fn provisional(req: &CheckoutRequest, cause: &OrderError) -> CheckoutOutcome {
        let order = CheckoutOrder {
            id: -snowflake_id(),
            order_number: order_number(),
            status: OrderStatus::Pending,
            total: req.total.unwrap_or(Decimal::ZERO),
        };
        tracing::warn!(
            order_number = %order.order_number,
            error = %cause,
            "Storage unavailable, returning provisional order"
        );
        CheckoutOutcome::Provisional(order)
    }
}
