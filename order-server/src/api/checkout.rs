//! POST /api/checkout: place an order

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use shared::order::{CheckoutRequest, CheckoutResponse};

use super::parse_json;
use crate::error::OrderResult;
use crate::state::AppState;

/// 201 for durable and provisional orders alike; `fallback` tells them apart
pub async fn checkout(
    State(state): State<AppState>,
    body: Bytes,
) -> OrderResult<(StatusCode, Json<CheckoutResponse>)> {
    let req: CheckoutRequest = parse_json(&body)?;
    let outcome = state.orders.checkout(&req).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}
