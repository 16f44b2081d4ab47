//! Test doubles and fixtures shared by the order engine and router tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::message::OrderStatusMessage;
use shared::models::{DeliveryMethod, Order, PaymentMethod};
use shared::order::{CartLine, CheckoutRequest, OptionValueRef, SelectedOption};

use crate::db::memory::MemoryStore;
use crate::idempotency::{IdempotencyStore, MemoryIdempotencyStore};
use crate::live::Notifier;
use crate::orders::{CheckoutOutcome, OrderService, OrderSettings};
use crate::stripe::{
    GatewayError, IntentRequest, IntentStatus, PaymentGateway, PaymentIntent,
    sign_webhook_payload, verify_webhook_signature,
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Owned copy of an [`IntentRequest`]
#[derive(Debug, Clone)]
pub struct RecordedIntent {
    pub amount: Decimal,
    pub currency: String,
    pub order_id: i64,
    pub order_number: String,
    pub receipt_email: Option<String>,
}

/// Scripted payment gateway
#[derive(Default)]
pub struct MockGateway {
    next_id: AtomicU64,
    fail_create: AtomicBool,
    created: Mutex<Vec<RecordedIntent>>,
    statuses: Mutex<HashMap<String, IntentStatus>>,
    cancelled: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Script what `retrieve_intent` reports for an intent
    pub fn set_status(&self, intent_id: &str, status: IntentStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(intent_id.to_string(), status);
    }

    pub fn created(&self) -> Vec<RecordedIntent> {
        self.created.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// A valid `Stripe-Signature` header for the payload
    pub fn sign(&self, payload: &[u8]) -> String {
        sign_webhook_payload(payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(&self, req: &IntentRequest<'_>) -> Result<PaymentIntent, GatewayError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        self.created.lock().unwrap().push(RecordedIntent {
            amount: req.amount,
            currency: req.currency.to_string(),
            order_id: req.order_id,
            order_number: req.order_number.to_string(),
            receipt_email: req.receipt_email.map(String::from),
        });
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_mock{n}");
        self.set_status(&id, IntentStatus::RequiresPaymentMethod);
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret_test"),
            id,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, GatewayError> {
        self.statuses
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("No such payment_intent: '{intent_id}'")))
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.cancelled.lock().unwrap().push(intent_id.to_string());
        self.set_status(intent_id, IntentStatus::Canceled);
        Ok(())
    }

    fn verify_webhook(&self, payload: &[u8], sig_header: &str) -> Result<(), &'static str> {
        verify_webhook_signature(payload, sig_header, WEBHOOK_SECRET)
    }
}

/// Notifier that keeps every emitted message
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<OrderStatusMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<OrderStatusMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn emit(&self, message: OrderStatusMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

/// An [`OrderService`] wired to in-memory collaborators
pub struct TestHarness {
    pub service: OrderService,
    pub store: MemoryStore,
    pub gateway: Arc<MockGateway>,
    pub idempotency: MemoryIdempotencyStore,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(OrderSettings::default(), true)
    }

    pub fn with_delivery_charge(delivery_charge: Decimal) -> Self {
        Self::build(
            OrderSettings {
                delivery_charge,
                ..OrderSettings::default()
            },
            true,
        )
    }

    pub fn without_gateway() -> Self {
        Self::build(OrderSettings::default(), false)
    }

    /// Swap in a different marker store
    pub fn with_idempotency(idempotency: Arc<dyn IdempotencyStore>) -> Self {
        let mut h = Self::new();
        h.service = wire(
            &h.store,
            Some(h.gateway.clone() as Arc<dyn PaymentGateway>),
            idempotency,
            h.notifier.clone(),
            OrderSettings::default(),
        );
        h
    }

    fn build(settings: OrderSettings, with_gateway: bool) -> Self {
        let store = MemoryStore::new();
        store.add_product(1, "Margherita", dec!(10.00));
        store.add_product(2, "Tiramisu", dec!(4.50));
        store.add_option_value(101, 10, 1, "Extras", "Extra cheese", dec!(2.50));

        let gateway = Arc::new(MockGateway::default());
        let idempotency = MemoryIdempotencyStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let service = wire(
            &store,
            with_gateway.then(|| gateway.clone() as Arc<dyn PaymentGateway>),
            Arc::new(idempotency.clone()),
            notifier.clone(),
            settings,
        );

        Self {
            service,
            store,
            gateway,
            idempotency,
            notifier,
        }
    }

    /// Place a durable order through checkout
    pub async fn place(&self, payment_method: PaymentMethod) -> Order {
        match self.service.checkout(&checkout_request(payment_method)).await {
            Ok(CheckoutOutcome::Durable { order, .. }) => order,
            other => panic!("expected durable order, got {other:?}"),
        }
    }
}

fn wire(
    store: &MemoryStore,
    gateway: Option<Arc<dyn PaymentGateway>>,
    idempotency: Arc<dyn IdempotencyStore>,
    notifier: Arc<RecordingNotifier>,
    settings: OrderSettings,
) -> OrderService {
    OrderService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        gateway,
        idempotency,
        notifier,
        settings,
    )
}

/// Pickup order for two Margheritas with extra cheese (25.00)
pub fn checkout_request(payment_method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        customer_name: "Ana García".into(),
        customer_phone: "+34 600 000 000".into(),
        customer_email: Some("ana@example.com".into()),
        delivery_method: DeliveryMethod::Pickup,
        delivery_address: None,
        delivery_instructions: None,
        payment_method,
        order_items: vec![CartLine {
            product_id: 1,
            quantity: 2,
            selected_options: Some(vec![SelectedOption {
                option_id: 10,
                values: vec![OptionValueRef { id: 101 }],
            }]),
        }],
        subtotal: None,
        total: None,
    }
}

/// Raw `payment_intent.*` webhook body
pub fn webhook_payload(event_id: &str, event_type: &str, intent_id: &str) -> Vec<u8> {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": event_type,
        "data": {"object": {"id": intent_id, "object": "payment_intent"}}
    })
    .to_string()
    .into_bytes()
}
