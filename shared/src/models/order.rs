//! Order Model
//!
//! Durable order records. Monetary fields are `Decimal` and serialize as JSON
//! numbers; they are always computed server-side.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status
///
/// `pending → confirmed → preparing → ready → delivering → delivered`,
/// with `cancelled` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "delivering" => Some(Self::Delivering),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Fulfillment type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    #[default]
    Pickup,
    Delivery,
}

impl DeliveryMethod {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pickup" => Some(Self::Pickup),
            "delivery" => Some(Self::Delivery),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }
}

/// Payment method chosen at checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "online" => Some(Self::Online),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Online => "online",
        }
    }
}

/// Payment settlement state (tracked separately from the order status)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(Self::Unpaid),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

/// Order header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub customer_id: Option<i64>,
    /// Contact snapshot at order time (not linked to later profile edits)
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,
    pub delivery_instructions: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_charge: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    /// Gateway payment-intent reference (online payments only)
    pub payment_intent_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order line (product snapshot at order time)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    /// Catalog price plus option adjustments, per unit
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
    #[serde(default)]
    pub options: Vec<OrderLineOption>,
}

/// Selected option value on an order line (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineOption {
    pub id: i64,
    pub order_line_id: i64,
    pub option_id: i64,
    pub option_name: String,
    pub value_id: i64,
    pub value_name: String,
    /// Per-unit adjustment applied to the line's unit price
    #[serde(with = "rust_decimal::serde::float")]
    pub price_adjustment: Decimal,
}

/// Status history entry (audit trail, never mutated)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEvent {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatus,
    pub description: Option<String>,
    /// `None` for system-generated transitions
    pub actor_id: Option<String>,
    pub created_at: i64,
}

/// Order with lines and status history (tracking / admin detail)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub status_history: Vec<StatusEvent>,
}
