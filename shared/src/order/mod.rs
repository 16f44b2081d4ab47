//! Checkout and order-lifecycle request/response types
//!
//! - Requests: checkout payload, status transition, cancel, payment confirmation
//! - Responses: checkout result (durable or provisional)

pub mod checkout;
pub mod lifecycle;

// Re-exports
pub use checkout::{
    CartLine, CheckoutOrder, CheckoutRequest, CheckoutResponse, OptionValueRef,
    PaymentIntentInfo, SelectedOption,
};
pub use lifecycle::{CancelRequest, PaymentConfirmRequest, StatusTransitionRequest};
