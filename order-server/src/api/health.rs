//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

/// Liveness plus a storage probe
///
/// Always 200: with storage down the service still takes provisional orders.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let storage_up = state.orders.storage_reachable().await;
    Json(serde_json::json!({
        "status": if storage_up { "ok" } else { "degraded" },
        "storage": if storage_up { "up" } else { "down" },
        "payments": state.orders.payments_enabled(),
        "service": "order-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
