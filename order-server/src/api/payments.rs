//! POST /api/payments/confirm: client-initiated payment confirmation

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use shared::models::Order;
use shared::order::PaymentConfirmRequest;

use super::parse_json;
use crate::error::OrderResult;
use crate::state::AppState;

pub async fn confirm_payment(
    State(state): State<AppState>,
    body: Bytes,
) -> OrderResult<Json<Order>> {
    let req: PaymentConfirmRequest = parse_json(&body)?;
    let order = state.orders.confirm_payment(&req.payment_intent_id).await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;
    use shared::models::PaymentMethod;

    use crate::api::tests::{app, json_request, send};
    use crate::stripe::IntentStatus;
    use crate::test_support::TestHarness;

    #[tokio::test]
    async fn confirms_succeeded_intent() {
        let h = TestHarness::new();
        let order = h.place(PaymentMethod::Online).await;
        let intent_id = order.payment_intent_id.unwrap();

        let req = || {
            json_request(
                "POST",
                "/api/payments/confirm",
                json!({"payment_intent_id": intent_id}),
            )
        };
        let (status, body) = send(app(&h), req()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["payment_status"], "requires_payment_method");

        h.gateway.set_status(&intent_id, IntentStatus::Succeeded);
        let (status, body) = send(app(&h), req()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "confirmed");
        assert_eq!(body["payment_status"], "paid");
    }

    #[tokio::test]
    async fn unknown_intent_is_404() {
        let h = TestHarness::new();
        let req = json_request(
            "POST",
            "/api/payments/confirm",
            json!({"payment_intent_id": "pi_ghost"}),
        );
        let (status, _) = send(app(&h), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
