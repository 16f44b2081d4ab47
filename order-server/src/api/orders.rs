//! Order tracking and admin order management
//!
//! - `GET  /api/orders/track/{order_number}`: public tracking view
//! - `GET  /api/admin/orders/{id}`: full order detail
//! - `POST /api/admin/orders/{id}/status`: status transition
//! - `POST /api/admin/orders/{id}/cancel`: cancel with optional reason

use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::error::AppError;
use shared::models::{
    DeliveryMethod, Order, OrderDetail, OrderLine, OrderStatus, PaymentStatus,
};
use shared::order::{CancelRequest, StatusTransitionRequest};

use super::parse_json;
use crate::auth::AdminIdentity;
use crate::error::OrderResult;
use crate::state::AppState;

/// Public tracking view: no contact details, no staff IDs
#[derive(Debug, Serialize)]
pub struct TrackingView {
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_method: DeliveryMethod,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_charge: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub lines: Vec<OrderLine>,
    pub status_history: Vec<TrackedStatus>,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct TrackedStatus {
    pub status: OrderStatus,
    pub description: Option<String>,
    pub created_at: i64,
}

impl From<OrderDetail> for TrackingView {
    fn from(detail: OrderDetail) -> Self {
        let OrderDetail {
            order,
            lines,
            status_history,
        } = detail;
        Self {
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            delivery_method: order.delivery_method,
            subtotal: order.subtotal,
            delivery_charge: order.delivery_charge,
            total: order.total,
            lines,
            status_history: status_history
                .into_iter()
                .map(|e| TrackedStatus {
                    status: e.status,
                    description: e.description,
                    created_at: e.created_at,
                })
                .collect(),
            created_at: order.created_at,
        }
    }
}

/// Numeric `{id}` path segment
///
/// Rejects with the structured error body instead of axum's plain-text one.
pub struct OrderId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for OrderId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        raw.trim().parse().map(OrderId).map_err(|_| {
            AppError::validation(format!("Invalid order id: {raw}")).with_detail("field", "id")
        })
    }
}

pub async fn track_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> OrderResult<Json<TrackingView>> {
    let detail = state.orders.track_order(&order_number).await?;
    Ok(Json(detail.into()))
}

pub async fn order_detail(
    State(state): State<AppState>,
    OrderId(id): OrderId,
) -> OrderResult<Json<OrderDetail>> {
    Ok(Json(state.orders.order_detail(id).await?))
}

pub async fn transition_status(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    OrderId(id): OrderId,
    body: Bytes,
) -> OrderResult<Json<Order>> {
    let req: StatusTransitionRequest = parse_json(&body)?;
    let order = state
        .orders
        .transition_status(id, &req, identity.actor_id.as_deref())
        .await?;
    Ok(Json(order))
}

/// The body is optional; an empty one cancels with the default reason
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    OrderId(id): OrderId,
    body: Bytes,
) -> OrderResult<Json<Order>> {
    let req: CancelRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelRequest::default()
    } else {
        parse_json(&body)?
    };
    let order = state
        .orders
        .cancel_order(id, req.reason.as_deref(), identity.actor_id.as_deref())
        .await?;
    Ok(Json(order))
}
