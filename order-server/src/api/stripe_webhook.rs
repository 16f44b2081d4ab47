//! Stripe webhook handler
//!
//! POST /stripe/webhook: payment intent events (raw body for signature verification)

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Handle incoming Stripe webhook events
///
/// Must receive raw body (not JSON) for HMAC signature verification.
/// Anything short of a signature, payload or storage problem is a 200 so
/// Stripe stops redelivering.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let sig_header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    match state.orders.handle_webhook(&body, sig_header).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Webhook handled");
            StatusCode::OK.into_response()
        }
        Err(e) => e.into_response(),
    }
}
