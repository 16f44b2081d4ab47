//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::NotFound | Self::OrderNotFound => StatusCode::NOT_FOUND,

            // 401 Unauthorized
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,

            // 502 Bad Gateway (payment provider failed)
            Self::PaymentProcessingFailed => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            Self::PaymentUnavailable | Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError | Self::OrderPersistenceFailed => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (validation, pricing, status-machine preconditions)
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::OrderEmpty
            | Self::InvalidProduct
            | Self::InvalidTransition
            | Self::OrderNotCancellable
            | Self::PaymentNotCompleted
            | Self::InvalidWebhookSignature => StatusCode::BAD_REQUEST,
        }
    }
}
