//! Checkout payload and response
//!
//! The checkout payload is untrusted: any `subtotal`/`total` the client sends
//! is carried only for the provisional (degraded-mode) response and never
//! used to price a durable order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::{AppError, ErrorCode};
use crate::models::order::{DeliveryMethod, OrderStatus, PaymentMethod};

/// Maximum allowed quantity per cart line
pub const MAX_QUANTITY: i32 = 9999;
/// Maximum number of lines in one cart
pub const MAX_CART_LINES: usize = 200;
/// Maximum length of free-text contact fields
const MAX_TEXT_LEN: usize = 500;

/// Reference to one selected option value: `{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionValueRef {
    pub id: i64,
}

/// Option selection on a cart line: `{option_id, values: [{id}]}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedOption {
    pub option_id: i64,
    #[serde(default)]
    pub values: Vec<OptionValueRef>,
}

/// One cart line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_options: Option<Vec<SelectedOption>>,
}

impl CartLine {
    /// Selected options (empty when the client omitted them)
    pub fn options(&self) -> &[SelectedOption] {
        self.selected_options.as_deref().unwrap_or_default()
    }
}

/// Checkout request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
    pub payment_method: PaymentMethod,
    pub order_items: Vec<CartLine>,
    /// Client-computed subtotal (ignored for durable orders)
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub subtotal: Option<Decimal>,
    /// Client-computed total (echoed only in degraded mode)
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total: Option<Decimal>,
}

fn field_error(field: &str, message: impl Into<String>) -> AppError {
    AppError::validation(message).with_detail("field", field)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl CheckoutRequest {
    /// Schema validation, performed before any I/O
    pub fn validate(&self) -> Result<(), AppError> {
        if self.customer_name.trim().is_empty() {
            return Err(field_error("customer_name", "customer_name is required"));
        }
        if self.customer_name.len() > MAX_TEXT_LEN {
            return Err(field_error("customer_name", "customer_name is too long"));
        }
        if self.customer_phone.trim().is_empty() {
            return Err(field_error("customer_phone", "customer_phone is required"));
        }
        if let Some(email) = self.contact_email()
            && !email.validate_email()
        {
            return Err(field_error("customer_email", "customer_email is not a valid email"));
        }

        if self.delivery_method == DeliveryMethod::Delivery
            && non_blank(self.delivery_address.as_deref()).is_none()
        {
            return Err(field_error(
                "delivery_address",
                "delivery_address is required for delivery orders",
            ));
        }
        for (field, value) in [
            ("delivery_address", &self.delivery_address),
            ("delivery_instructions", &self.delivery_instructions),
        ] {
            if value.as_ref().is_some_and(|v| v.len() > MAX_TEXT_LEN) {
                return Err(field_error(field, format!("{field} is too long")));
            }
        }

        if self.order_items.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty).with_detail("field", "order_items"));
        }
        if self.order_items.len() > MAX_CART_LINES {
            return Err(field_error(
                "order_items",
                format!("order_items exceeds maximum of {MAX_CART_LINES} lines"),
            ));
        }
        for (idx, line) in self.order_items.iter().enumerate() {
            if line.product_id <= 0 {
                return Err(field_error(
                    "order_items",
                    format!("order_items[{idx}].product_id must be positive"),
                ));
            }
            if line.quantity < 1 || line.quantity > MAX_QUANTITY {
                return Err(field_error(
                    "order_items",
                    format!(
                        "order_items[{idx}].quantity must be between 1 and {MAX_QUANTITY}, got {}",
                        line.quantity
                    ),
                ));
            }
        }

        for (field, value) in [("subtotal", self.subtotal), ("total", self.total)] {
            if value.is_some_and(|v| v.is_sign_negative() && !v.is_zero()) {
                return Err(field_error(field, format!("{field} must be non-negative")));
            }
        }

        Ok(())
    }

    /// Trimmed contact email, `None` when absent or blank
    pub fn contact_email(&self) -> Option<&str> {
        non_blank(self.customer_email.as_deref())
    }

    /// Delivery address, kept only for delivery orders
    pub fn effective_delivery_address(&self) -> Option<&str> {
        match self.delivery_method {
            DeliveryMethod::Delivery => non_blank(self.delivery_address.as_deref()),
            DeliveryMethod::Pickup => None,
        }
    }
}

/// Order summary returned by checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutOrder {
    /// Durable orders carry their row ID; provisional orders a negative synthetic ID
    pub id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Client-side handle for completing an online payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntentInfo {
    pub client_secret: String,
    pub id: String,
}

/// Checkout response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: CheckoutOrder,
    pub payment_intent: Option<PaymentIntentInfo>,
    /// `true` when storage was unavailable and nothing was persisted
    pub fallback: bool,
}
