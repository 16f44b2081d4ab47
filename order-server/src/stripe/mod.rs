//! Stripe integration via REST API (no SDK dependency)
//!
//! [`PaymentGateway`] is the seam the order engine talks to; [`StripeGateway`]
//! is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use sha2::Sha256;
use thiserror::Error;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum accepted age of a signed webhook timestamp, in seconds
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Transport(String),
    #[error("payment gateway timed out")]
    Timeout,
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// Payment intent creation parameters
#[derive(Debug, Clone)]
pub struct IntentRequest<'a> {
    pub amount: Decimal,
    pub currency: &'a str,
    pub order_id: i64,
    pub order_number: &'a str,
    pub receipt_email: Option<&'a str>,
}

/// Created payment intent
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Payment intent status as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    RequiresCapture,
    Canceled,
    Other(String),
}

impl IntentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "requires_confirmation" => Self::RequiresConfirmation,
            "requires_action" => Self::RequiresAction,
            "requires_capture" => Self::RequiresCapture,
            "canceled" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Processing => "processing",
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External payment processor
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for the order total
    async fn create_intent(&self, req: &IntentRequest<'_>) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, GatewayError>;

    /// Cancel an intent whose order never became durable
    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError>;

    /// Verify a webhook signature header against the raw payload
    fn verify_webhook(&self, payload: &[u8], sig_header: &str) -> Result<(), &'static str>;
}

/// Stripe payment intent IDs: `pi_` followed by alphanumerics
///
/// Client-supplied IDs are interpolated into request paths, so anything else
/// is rejected before reaching the gateway.
pub fn is_valid_intent_id(id: &str) -> bool {
    id.len() <= 255
        && id.strip_prefix("pi_").is_some_and(|rest| {
            !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        })
}

/// Convert a decimal amount to the smallest currency unit (cents)
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(GatewayError::InvalidAmount(amount));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(GatewayError::InvalidAmount(amount))
}

fn stripe_error(resp: &serde_json::Value) -> GatewayError {
    let message = resp["error"]["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| resp.to_string());
    GatewayError::Rejected(message)
}

/// Stripe REST client
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            base_url: STRIPE_API_BASE.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, req: &IntentRequest<'_>) -> Result<PaymentIntent, GatewayError> {
        let amount = to_minor_units(req.amount)?.to_string();
        let order_id = req.order_id.to_string();
        let mut form = vec![
            ("amount", amount.as_str()),
            ("currency", req.currency),
            ("automatic_payment_methods[enabled]", "true"),
            ("metadata[order_id]", order_id.as_str()),
            ("metadata[order_number]", req.order_number),
        ];
        if let Some(email) = req.receipt_email {
            form.push(("receipt_email", email));
        }

        let resp: serde_json::Value = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", format!("order-{}", req.order_id))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        match (resp["id"].as_str(), resp["client_secret"].as_str()) {
            (Some(id), Some(secret)) => Ok(PaymentIntent {
                id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            _ => Err(stripe_error(&resp)),
        }
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, GatewayError> {
        let resp: serde_json::Value = self
            .client
            .get(format!("{}/payment_intents/{intent_id}", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?
            .json()
            .await?;

        resp["status"]
            .as_str()
            .map(IntentStatus::parse)
            .ok_or_else(|| stripe_error(&resp))
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        let resp: serde_json::Value = self
            .client
            .post(format!("{}/payment_intents/{intent_id}/cancel", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?
            .json()
            .await?;

        if resp["status"].as_str() == Some("canceled") {
            Ok(())
        } else {
            Err(stripe_error(&resp))
        }
    }

    fn verify_webhook(&self, payload: &[u8], sig_header: &str) -> Result<(), &'static str> {
        verify_webhook_signature(payload, sig_header, &self.webhook_secret)
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    verify_webhook_signature_at(payload, sig_header, secret, chrono::Utc::now().timestamp())
}

fn verify_webhook_signature_at(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Any v1 entry may match (Stripe sends several during secret rotation)
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err("Webhook signature mismatch");
    }

    // Reject events older than 5 minutes to prevent replay attacks
    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// Build a `Stripe-Signature` header value for a payload
#[cfg(test)]
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// Payment event relevant to order reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEventKind {
    PaymentSucceeded {
        intent_id: String,
    },
    PaymentFailed {
        intent_id: String,
        message: Option<String>,
    },
    /// Any event type this service does not act on
    Other(String),
}

/// Parsed webhook event
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: WebhookEventKind,
}

/// Parse a verified webhook payload
pub fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent, String> {
    let event: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| format!("invalid JSON: {e}"))?;

    let id = event["id"]
        .as_str()
        .ok_or("event missing id")?
        .to_string();
    let event_type = event["type"].as_str().unwrap_or("");
    let object = &event["data"]["object"];
    let intent_id = || {
        object["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("{event_type} event missing data.object.id"))
    };

    let kind = match event_type {
        "payment_intent.succeeded" => WebhookEventKind::PaymentSucceeded {
            intent_id: intent_id()?,
        },
        "payment_intent.payment_failed" => WebhookEventKind::PaymentFailed {
            intent_id: intent_id()?,
            message: object["last_payment_error"]["message"]
                .as_str()
                .map(String::from),
        },
        other => WebhookEventKind::Other(other.to_string()),
    };

    Ok(WebhookEvent { id, kind })
}
