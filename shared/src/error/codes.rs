//! Unified error codes for the ordering platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is in a terminal state and cannot transition
    InvalidTransition = 4002,
    /// Order is delivered or already cancelled
    OrderNotCancellable = 4003,
    /// Order transaction aborted
    OrderPersistenceFailed = 4004,
    /// Order has no items
    OrderEmpty = 4007,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed at the gateway
    PaymentProcessingFailed = 5001,
    /// Online payment is not configured
    PaymentUnavailable = 5002,
    /// Payment intent has not succeeded
    PaymentNotCompleted = 5003,
    /// Webhook signature could not be verified
    InvalidWebhookSignature = 5004,

    // ==================== 6xxx: Product ====================
    /// Product is unknown or inactive
    InvalidProduct = 6001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Storage layer unreachable
    StorageUnavailable = 9401,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "Authentication required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Order status cannot be changed",
            ErrorCode::OrderNotCancellable => "Order cannot be cancelled",
            ErrorCode::OrderPersistenceFailed => "Order could not be saved",
            ErrorCode::OrderEmpty => "Order has no items",

            // Payment
            ErrorCode::PaymentProcessingFailed => "Payment processing failed",
            ErrorCode::PaymentUnavailable => "Online payment is currently unavailable",
            ErrorCode::PaymentNotCompleted => "Payment has not been completed",
            ErrorCode::InvalidWebhookSignature => "Invalid webhook signature",

            // Product
            ErrorCode::InvalidProduct => "Product is unavailable",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::StorageUnavailable => "Storage is unavailable",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4003 => Ok(ErrorCode::OrderNotCancellable),
            4004 => Ok(ErrorCode::OrderPersistenceFailed),
            4007 => Ok(ErrorCode::OrderEmpty),

            // Payment
            5001 => Ok(ErrorCode::PaymentProcessingFailed),
            5002 => Ok(ErrorCode::PaymentUnavailable),
            5003 => Ok(ErrorCode::PaymentNotCompleted),
            5004 => Ok(ErrorCode::InvalidWebhookSignature),

            // Product
            6001 => Ok(ErrorCode::InvalidProduct),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9401 => Ok(ErrorCode::StorageUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
