//! API routes for the order server

pub mod checkout;
pub mod health;
pub mod orders;
pub mod payments;
pub mod stripe_webhook;

use std::time::Duration;

use axum::body::Bytes;
use axum::routing::{get, post};
use axum::{Router, middleware};
use serde::de::DeserializeOwned;
use shared::error::AppError;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::admin_auth_middleware;
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    // Order management (admin bearer token)
    let admin = Router::new()
        .route("/api/admin/orders/{id}", get(orders::order_detail))
        .route("/api/admin/orders/{id}/status", post(orders::transition_status))
        .route("/api/admin/orders/{id}/cancel", post(orders::cancel_order))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    // Storefront (no auth)
    let public = Router::new()
        .route("/api/checkout", post(checkout::checkout))
        .route("/api/payments/confirm", post(payments::confirm_payment))
        .route("/api/orders/track/{order_number}", get(orders::track_order));

    // Stripe webhook (signature-verified, raw body)
    let webhook = Router::new().route("/stripe/webhook", post(stripe_webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(public)
        .merge(webhook)
        .merge(admin)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Deserialize a JSON request body, reporting failures as validation errors
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::live::OrderEventHub;
    use crate::test_support::TestHarness;

    pub(super) const ADMIN_TOKEN: &str = "test-admin-token";

    pub(super) fn app(h: &TestHarness) -> Router {
        let state = AppState::from_service(h.service.clone(), OrderEventHub::new(), ADMIN_TOKEN);
        create_router(state, Duration::from_secs(5))
    }

    pub(super) async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub(super) fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_storage() {
        let h = TestHarness::new();
        let get = || Request::get("/health").body(Body::empty()).unwrap();

        let (status, body) = send(app(&h), get()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "up");

        h.store.set_available(false);
        let (status, body) = send(app(&h), get()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["storage"], "down");
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = parse_json::<serde_json::Value>(&Bytes::from_static(b"{nope")).unwrap_err();
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
    }
}
