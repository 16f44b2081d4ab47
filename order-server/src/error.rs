//! Service-layer error type for the order engine
//!
//! `OrderError` sits between the storage/gateway layers and the API-layer
//! `AppError`. Handlers return it directly and rely on `IntoResponse`.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use thiserror::Error;

use crate::db::StorageError;
use crate::stripe::{GatewayError, IntentStatus};

#[derive(Debug, Error)]
pub enum OrderError {
    /// Request failed schema validation (already an AppError with the right code)
    #[error(transparent)]
    Invalid(#[from] AppError),

    #[error("product {0} is unknown or inactive")]
    InvalidProduct(i64),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("order is {current}; cannot move to {target}")]
    InvalidTransition {
        current: OrderStatus,
        target: OrderStatus,
    },

    #[error("order is {0} and cannot be cancelled")]
    NotCancellable(OrderStatus),

    #[error("online payment is not available")]
    PaymentUnavailable,

    #[error("payment intent {intent_id} is {status}")]
    PaymentNotCompleted {
        intent_id: String,
        status: IntentStatus,
    },

    #[error("payment processing failed: {0}")]
    PaymentProcessing(#[source] GatewayError),

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(&'static str),

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// A write inside the checkout transaction failed and was rolled back
    #[error("order persistence failed: {0}")]
    Persistence(#[source] StorageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Background processing panicked or was cancelled
    #[error("processing aborted: {0}")]
    Aborted(#[source] tokio::task::JoinError),
}

impl OrderError {
    /// Classify a storage failure that happened inside the checkout transaction
    pub fn persistence(e: StorageError) -> Self {
        if e.is_unavailable() {
            OrderError::Storage(e)
        } else {
            OrderError::Persistence(e)
        }
    }

    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, OrderError::Storage(e) if e.is_unavailable())
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Invalid(app_err) => app_err,
            OrderError::InvalidProduct(id) => {
                AppError::with_message(ErrorCode::InvalidProduct, e.to_string())
                    .with_detail("product_id", id)
            }
            OrderError::OrderNotFound(ref key) => {
                AppError::with_message(ErrorCode::OrderNotFound, e.to_string())
                    .with_detail("order", key.clone())
            }
            OrderError::InvalidTransition { current, target } => AppError::with_message(
                ErrorCode::InvalidTransition,
                format!("order is {current}; cannot move to {target}"),
            )
            .with_detail("current_status", current.as_db())
            .with_detail("target_status", target.as_db()),
            OrderError::NotCancellable(current) => {
                AppError::with_message(ErrorCode::OrderNotCancellable, e.to_string())
                    .with_detail("current_status", current.as_db())
            }
            OrderError::PaymentUnavailable => AppError::new(ErrorCode::PaymentUnavailable),
            OrderError::PaymentNotCompleted { ref status, .. } => {
                let status = status.to_string();
                AppError::with_message(ErrorCode::PaymentNotCompleted, e.to_string())
                    .with_detail("payment_status", status)
            }
            OrderError::PaymentProcessing(ref gateway_err) => {
                tracing::error!(error = %gateway_err, "Payment gateway error");
                AppError::new(ErrorCode::PaymentProcessingFailed)
            }
            OrderError::InvalidSignature(reason) => {
                AppError::with_message(ErrorCode::InvalidWebhookSignature, reason)
            }
            OrderError::InvalidPayload(ref reason) => {
                AppError::with_message(ErrorCode::InvalidRequest, reason.clone())
            }
            OrderError::Persistence(ref db_err) => {
                tracing::error!(error = %db_err, "Order persistence failed");
                AppError::new(ErrorCode::OrderPersistenceFailed)
            }
            OrderError::Storage(StorageError::Unavailable(ref reason)) => {
                tracing::error!(reason = %reason, "Storage unavailable");
                AppError::new(ErrorCode::StorageUnavailable)
            }
            OrderError::Storage(StorageError::NotFound(what)) => AppError::not_found(what),
            OrderError::Storage(StorageError::Database(ref db_err)) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::DatabaseError)
            }
            OrderError::Aborted(ref join_err) => {
                tracing::error!(error = %join_err, "Order processing aborted");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type OrderResult<T> = Result<T, OrderError>;
